use facility_import_core::{FacilityType, ImportConfig, TargetField};
use facility_import_csv::{auto_map, normalize_header, parse_csv, prepare_csv_str, write_csv};

const SAMPLES: [&str; 6] = [
    "Name,Code\n\"Acme, Inc\",A1",
    "\u{feff}Facility Name,HF Code,Lat,Long\r\nKissy MCHP,WU-0101,8.47,-13.20\r\n\r\n",
    "Name,Notes\nBo,\"line one\nline two\"\nKenema,\"He said \"\"urgent\"\"\"\n",
    "A,B,C\n1\n,2,\n x , y ,z\n",
    "\"Padded  Header \",Other\n  leading space,trailing space  \n",
    "Name,Code,,\nKissy,K1,x,y\n",
];

#[test]
fn write_then_parse_round_trips() {
    for sample in SAMPLES {
        let table = parse_csv(sample);
        let written = write_csv(&table).expect("table should serialize");
        assert_eq!(parse_csv(&written), table, "sample: {sample:?}");
    }
}

#[test]
fn record_count_matches_non_blank_lines() {
    let text = "Name,Code\n\nKissy,K1\n   \nLumley,L1\nBo,B1\n";
    let non_blank = text.lines().filter(|line| !line.trim().is_empty()).count();
    assert_eq!(1 + parse_csv(text).rows.len(), non_blank);
}

#[test]
fn normalized_headers_are_stable() {
    for sample in SAMPLES {
        for header in parse_csv(sample).headers {
            let once = normalize_header(&header);
            assert_eq!(normalize_header(&once), once);
        }
    }
}

#[test]
fn auto_mapping_twice_is_identical() {
    let table = parse_csv(SAMPLES[1]);
    assert_eq!(auto_map(&table.headers), auto_map(&table.headers));
}

#[test]
fn end_to_end_with_detected_mapping() {
    let batch = prepare_csv_str(SAMPLES[1], &ImportConfig::default());

    assert_eq!(batch.items.len(), 1);
    let item = &batch.items[0];
    assert_eq!(item.name, "Kissy MCHP");
    assert_eq!(item.facility_code, "WU-0101");
    assert_eq!(item.facility_type, FacilityType::PrimaryHealthUnit);
    assert_eq!(item.latitude, Some(8.47));
    assert_eq!(item.longitude, Some(-13.2));
    assert_eq!(item.level, None);
    assert!(item.is_active);
}

#[test]
fn quoted_comma_example() {
    let table = parse_csv(SAMPLES[0]);
    assert_eq!(table.headers, vec!["Name", "Code"]);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.cell(0, "Name"), "Acme, Inc");
    assert_eq!(table.cell(0, "Code"), "A1");

    let mapping = auto_map(&table.headers);
    assert_eq!(mapping.get(TargetField::Name), Some("Name"));
    assert_eq!(mapping.get(TargetField::FacilityCode), Some("Code"));
}
