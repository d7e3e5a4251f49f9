use std::fs;

use road_curvature::{
    collector::{CollectorConfig, WayCollector},
    config::Config,
    data::{Collection, JoinType},
    errors::Result,
    etl::{parse_osm::OsmXmlReader, score_roads::ScoreRoadsEtl, Etl},
};

const METERS_PER_DEGREE_LAT: f64 = 111_230.0;
const METERS_PER_DEGREE_LON: f64 = 80_012.0;

/// Node xml for a zig-zag running north: 20m steps north, alternating 10m east.
/// Every bend has a radius of about 25m.
fn zig_zag_nodes(first_id: i64, count: i64, east_offset_m: f64) -> String {
    (0..count)
        .map(|k| {
            let lat = 44.0 + (20.0 * k as f64) / METERS_PER_DEGREE_LAT;
            let east = east_offset_m + if k % 2 == 1 { 10.0 } else { 0.0 };
            let lon = -73.0 + east / METERS_PER_DEGREE_LON;
            format!(r#"  <node id="{}" lat="{:.7}" lon="{:.7}"/>"#, first_id + k, lat, lon)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn way_xml(id: i64, refs: &[i64], tags: &[(&str, &str)]) -> String {
    let nds: Vec<String> = refs.iter().map(|r| format!(r#"    <nd ref="{}"/>"#, r)).collect();
    let tags: Vec<String> = tags
        .iter()
        .map(|(k, v)| format!(r#"    <tag k="{}" v="{}"/>"#, k, v))
        .collect();
    format!("  <way id=\"{}\">\n{}\n{}\n  </way>", id, nds.join("\n"), tags.join("\n"))
}

fn sample_osm() -> String {
    let hairpin_a: Vec<i64> = (1..=6).collect();
    let hairpin_b: Vec<i64> = (6..=11).rev().collect();
    let gravel: Vec<i64> = (101..=111).collect();
    let ways = [
        // Ways come before their nodes to exercise out-of-order resolution.
        way_xml(500, &hairpin_a, &[("highway", "secondary"), ("name", "Hairpin Road")]),
        way_xml(501, &hairpin_b, &[("highway", "secondary"), ("name", "Hairpin Road")]),
        way_xml(502, &[201, 202, 203], &[("highway", "tertiary"), ("name", "Flat Road")]),
        way_xml(503, &gravel, &[("highway", "secondary"), ("name", "Gravel Pass"), ("surface", "gravel")]),
        way_xml(504, &[1, 300], &[("highway", "footway")]),
    ];
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
{}
{}
{}
  <node id="201" lat="44.1000000" lon="-73.0000000"/>
  <node id="202" lat="44.1020000" lon="-73.0000000"/>
  <node id="203" lat="44.1040000" lon="-73.0000000"/>
</osm>
"#,
        ways.join("\n"),
        zig_zag_nodes(1, 11, 0.0),
        zig_zag_nodes(101, 11, 800.0),
    )
}

fn score(config: &Config) -> Vec<Collection> {
    let osm = sample_osm();
    let collections = WayCollector::new(config.collector.clone())
        .collect(OsmXmlReader::new(osm.as_bytes()))
        .unwrap();
    let pipeline = config.build_pipeline().unwrap();
    let output = pipeline.run(collections).collect::<Result<Vec<_>>>();
    output.unwrap()
}

#[test]
fn collector_joins_and_keeps_every_road() {
    let osm = sample_osm();
    let collections = WayCollector::new(CollectorConfig::default())
        .collect(OsmXmlReader::new(osm.as_bytes()))
        .unwrap();
    let names: Vec<&str> = collections.iter().filter_map(|c| c.join_data.as_deref()).collect();
    assert_eq!(names, vec!["Flat Road", "Gravel Pass", "Hairpin Road"]);
    let hairpin = &collections[2];
    assert_eq!(hairpin.ways.len(), 2);
    assert_eq!(hairpin.ways[1].refs, (6..=11).collect::<Vec<i64>>());
}

#[test]
fn default_pipeline_keeps_only_the_twisty_paved_road() {
    let config = Config::from_json(r#"{"data_path": "sample.osm"}"#).unwrap();
    let output = score(&config);
    assert_eq!(output.len(), 1);

    let hairpin = &output[0];
    assert_eq!(hairpin.join_type, JoinType::Name);
    assert_eq!(hairpin.join_data.as_deref(), Some("Hairpin Road"));
    let length = hairpin.length.unwrap();
    let curvature = hairpin.curvature.unwrap();
    assert!((length - 223.6).abs() < 2.0, "length {}", length);
    assert!((curvature - 2.0 * length).abs() < 1e-6, "curvature {}", curvature);
    assert!(hairpin.bounds.is_some());

    for pair in hairpin.ways.windows(2) {
        assert_eq!(pair[0].coords.last(), pair[1].coords.first());
    }
    for segment in hairpin.segments("test").unwrap() {
        assert_eq!(segment.curvature_level, Some(4));
    }
}

#[test]
fn custom_pipeline_sorts_everything_by_length() {
    let config = Config::from_json(
        r#"{
            "data_path": "sample.osm",
            "pipeline": [
                {"stage": "add_segments"},
                {"stage": "roll_up_length"},
                {"stage": "sort_collections_by_sum", "key": "length", "direction": "descending"},
                {"stage": "validate"}
            ]
        }"#,
    )
    .unwrap();
    let output = score(&config);
    // The flat road is about twice as long as either zig-zag.
    assert_eq!(output.len(), 3);
    assert_eq!(output[0].join_data.as_deref(), Some("Flat Road"));
    assert!(output[0].length.unwrap() > 1.9 * output[1].length.unwrap());
    assert!(output[1].length.unwrap() >= output[2].length.unwrap());
}

#[test]
fn etl_writes_json_lines_once() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("sample.osm");
    fs::write(&data_path, sample_osm()).unwrap();
    let output_dir = dir.path().join("output");

    let config = Config::from_json(&format!(
        r#"{{"data_path": {}, "output_dir": {}}}"#,
        serde_json::to_string(&data_path.to_string_lossy()).unwrap(),
        serde_json::to_string(&output_dir.to_string_lossy()).unwrap(),
    ))
    .unwrap();

    let mut etl = ScoreRoadsEtl::new(&config).unwrap();
    etl.process(&output_dir, false).unwrap();

    let output_path = ScoreRoadsEtl::output_path(&output_dir);
    let written = fs::read_to_string(&output_path).unwrap();
    let lines: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["join_type"], "name");
    assert_eq!(lines[0]["join_data"], "Hairpin Road");
    assert!(lines[0]["curvature"].as_f64().unwrap() > 300.0);
    assert!(lines[0]["max_lat"].as_f64().unwrap() > 44.0);
    assert!(lines[0]["ways"][0]["segments"][0]["radius"].as_f64().unwrap() < 30.0);

    // A second run finds the output and leaves it alone.
    fs::write(&output_path, "kept\n").unwrap();
    etl.process(&output_dir, false).unwrap();
    assert_eq!(fs::read_to_string(&output_path).unwrap(), "kept\n");

    etl.process(&output_dir, true).unwrap();
    assert_ne!(fs::read_to_string(&output_path).unwrap(), "kept\n");
}
