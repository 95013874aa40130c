//! End-to-end tests: triple file → hierarchy → task files on disk.

use std::collections::BTreeMap;
use std::path::Path;

use relhier::config::RunConfig;
use relhier::generator::EvaluationSetGenerator;
use relhier::hierarchy::{Hierarchy, HierarchyBuilder, LEAF_SIZE};
use relhier::mapping::{PropertyMapping, Relation, Term, load_mapping, parse_triples_csv};
use relhier::selector::SelectorOptions;
use relhier::tasks::TaskKind;

const WD: &str = "http://www.wikidata.org/entity/";
const WDT: &str = "http://www.wikidata.org/prop/direct/";

/// 60 people: sex by parity, four countries, an occupation for two thirds.
fn triples_csv() -> String {
    let mut csv = String::from("subject,predicate,object\n");
    for i in 0..60 {
        let subject = format!("{WD}Q{}", 5000 + i);
        let sex = if i % 2 == 0 { "Q6581097" } else { "Q6581072" };
        csv.push_str(&format!("{subject},{WDT}P21,{WD}{sex}\n"));
        let country = ["Q142", "Q183", "Q30", "Q145"][i % 4];
        csv.push_str(&format!("{subject},{WDT}P27,{WD}{country}\n"));
        if i % 3 != 0 {
            let occupation = ["Q82955", "Q36180"][i % 2];
            csv.push_str(&format!("\"{subject}\",{WDT}P106,{WD}{occupation}\n"));
        }
    }
    csv
}

fn read_tree(root: &Path) -> BTreeMap<String, String> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let name = path.strip_prefix(root).unwrap().display().to_string();
                out.insert(name, std::fs::read_to_string(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn assert_well_formed(hierarchy: &Hierarchy) {
    for id in hierarchy.ids() {
        let node = hierarchy.node(id);
        let mut predicates = Vec::new();
        for (_, child) in hierarchy.children(id) {
            assert!(child.values.is_subset(&node.values));
            assert!(!child.values.is_empty());
            assert_ne!(child.values, node.values);
            let relation = child.relation().unwrap();
            assert!(!node.splits.contains(&relation.predicate));
            predicates.push(relation.predicate.clone());
        }
        predicates.dedup();
        assert!(predicates.len() <= 1);
    }
    for leaf in hierarchy.leaves() {
        let node = hierarchy.node(leaf);
        assert!(node.children.is_empty() || node.values.len() <= LEAF_SIZE);
    }
}

#[test]
fn triple_file_builds_a_well_formed_hierarchy() {
    let mapping = parse_triples_csv(&triples_csv()).unwrap();
    assert_eq!(mapping.universe().len(), 60);
    assert!(mapping.contains(&Relation::new("P21", "Q6581097")));

    let (hierarchy, stats) = HierarchyBuilder::new(mapping, SelectorOptions::default())
        .with_workers(4)
        .build()
        .unwrap();
    assert_eq!(hierarchy.node(hierarchy.root()).values.len(), 60);
    assert!(stats.depth >= 2);
    assert_eq!(stats.leaves, hierarchy.leaves().len());
    assert_well_formed(&hierarchy);
}

#[test]
fn full_coverage_relation_stays_a_single_leaf() {
    let mapping = PropertyMapping::from_triples(
        (0..20).map(|i| (Term::new(format!("Q{i}")), "P31", "Q5")),
    );
    let (hierarchy, stats) = HierarchyBuilder::new(mapping, SelectorOptions::default())
        .build()
        .unwrap();
    assert_eq!(hierarchy.len(), 1);
    assert!(hierarchy.node(hierarchy.root()).is_leaf());
    assert_eq!(stats.leaves, 1);
}

#[test]
fn generate_writes_headers_and_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("triples.csv");
    std::fs::write(&input, triples_csv()).unwrap();
    let config_path = dir.path().join("run.toml");
    std::fs::write(
        &config_path,
        "seed = 1234\n[builder]\nworkers = 3\n[tasks]\nanalogy_per_object = 3\n",
    )
    .unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    let generator = EvaluationSetGenerator::new(config).unwrap();
    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    let dump = dir.path().join("hierarchy.csv");

    let report = generator.run(&input, &first_dir, Some(&dump)).unwrap();
    generator.run(&input, &second_dir, None).unwrap();

    let first = read_tree(&first_dir);
    let second = read_tree(&second_dir);
    assert_eq!(first.len(), report.total_files());
    assert_eq!(first, second);

    for (name, content) in &first {
        let header = content.lines().next().unwrap();
        let file = name.rsplit('/').next().unwrap();
        match file.split('_').next().unwrap() {
            "neighborhood" => assert_eq!(header, "entity,group_id,is_similar"),
            "outlier" => assert_eq!(header, "entity,group_id,is_outlier"),
            "similarity" => assert_eq!(header, "a,b,group_id,rank"),
            "analogy" => assert_eq!(header, "a,b"),
            "entities" => assert!(header.starts_with('Q')),
            other => panic!("unexpected task file {name} ({other})"),
        }
    }
    for kind in [TaskKind::Neighborhood, TaskKind::Entities, TaskKind::Analogy] {
        assert!(report.files[&kind] > 0, "{kind} wrote no files");
    }

    let dump = std::fs::read_to_string(&dump).unwrap();
    let dumped: usize = dump
        .lines()
        .map(|line| line.split_once(',').unwrap().1.split(' ').count())
        .sum();
    assert!(dumped <= 60);
    assert!(dump.lines().all(|line| line.contains('=') || line.starts_with("root")));
}

#[test]
fn outliers_come_from_other_branches() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::default();
    config.tasks.enabled = vec!["outlier".into()];
    let generator = EvaluationSetGenerator::new(config).unwrap();
    let mapping = parse_triples_csv(&triples_csv()).unwrap();
    let (hierarchy, _) = generator.build(mapping).unwrap();
    let mut sink = relhier::tasks::FsSink::new(dir.path());
    generator.generate(&hierarchy, &mut sink).unwrap();

    let files = read_tree(dir.path());
    assert!(!files.is_empty());
    for (name, content) in files {
        let path = name.trim_end_matches(".csv");
        let (dir, leaf) = path.rsplit_once('/').unwrap();
        let full = format!("{dir}/{}", leaf.trim_start_matches("outlier_"));
        let ancestors: Vec<&str> = full.split('/').skip(2).step_by(2).collect();
        for row in content.lines().skip(1) {
            let fields: Vec<&str> = row.split(',').collect();
            if fields[2] == "True" {
                assert!(!ancestors.contains(&fields[0]), "{row} in {name}");
            }
        }
    }
}

#[test]
fn json_snapshot_round_trips_through_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = parse_triples_csv(&triples_csv()).unwrap();
    let path = dir.path().join("mapping.json");
    relhier::mapping::save_json(&mapping, &path).unwrap();
    assert_eq!(load_mapping(&path).unwrap(), mapping);
}
