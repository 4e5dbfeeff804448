use std::path::{Path, PathBuf};

use hips_recon::model::Value;
use hips_recon::{
    validate_dir, Dataset, DiagnosticKind, Outcome, Schema, Severity, ValidateOptions,
    ValidationReport,
};
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn schema() -> Schema {
    Schema::from_dir(&fixtures_dir().join("schema")).unwrap()
}

// ---------------------------------------------------------------------------
// Data directory builder
// ---------------------------------------------------------------------------

type Cells = Vec<(&'static str, String)>;

fn meta_row(id: u64, x: u64, y: u64) -> Cells {
    vec![
        ("Identifier.ObjectCode", format!("{id}.0")),
        ("Identifier.Xmin", x.to_string()),
        ("Identifier.Ymin", y.to_string()),
        ("Identifier.Xmax", (x + 4).to_string()),
        ("Identifier.Ymax", (y + 5).to_string()),
        ("Identifier.CentroidX", (x + 2).to_string()),
        ("Identifier.CentroidY", (y + 2).to_string()),
        ("Classif.StandardClass", "TILsCell".to_string()),
        ("ClassifProbab.CancerEpithelium", "0.125".to_string()),
        ("ClassifProbab.TILsCell", "0.875".to_string()),
    ]
}

fn props_row(id: u64, x: u64, y: u64) -> Cells {
    vec![
        ("Identifier.ObjectCode", format!("{id}.0")),
        ("Identifier.Xmin", format!("{x}.0")),
        ("Identifier.Ymin", format!("{y}.0")),
        ("Identifier.Xmax", format!("{}.0", x + 5)),
        ("Identifier.Ymax", format!("{}.0", y + 6)),
        ("Identifier.CentroidX", format!("{}.25", x + 2)),
        ("Identifier.CentroidY", format!("{}.75", y + 2)),
        ("slide", "TCGA-A1-A0SK".to_string()),
        ("roiname", "roi-5".to_string()),
        ("Identifier.WeightedCentroidX", format!("{}.3", x + 2)),
        ("Identifier.WeightedCentroidY", format!("{}.7", y + 2)),
        ("Size.Area", "30.0".to_string()),
        ("Size.Perimeter", "21.5".to_string()),
        ("Nucleus.Intensity.Mean", "101.25".to_string()),
    ]
}

const OBJECTS: [(u64, u64, u64); 3] = [(1, 10, 20), (2, 40, 60), (3, 100, 120)];

fn good_rows() -> (Vec<Cells>, Vec<Cells>) {
    let meta = OBJECTS.iter().map(|&(id, x, y)| meta_row(id, x, y)).collect();
    let props = OBJECTS.iter().map(|&(id, x, y)| props_row(id, x, y)).collect();
    (meta, props)
}

fn set(row: &mut Cells, field: &str, value: &str) {
    let cell = row
        .iter_mut()
        .find(|(k, _)| *k == field)
        .unwrap_or_else(|| panic!("no field {field}"));
    cell.1 = value.to_string();
}

fn roi_file(image: &str, roi: u32) -> String {
    format!("{image}_roi-{roi}_left-18001_top-45779_right-20049_bottom-47827.csv")
}

struct ImageDir {
    _tmp: TempDir,
    path: PathBuf,
}

impl ImageDir {
    fn new(name: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(name);
        for dataset in Dataset::ALL {
            std::fs::create_dir_all(path.join(dataset.dir_name())).unwrap();
        }
        Self { _tmp: tmp, path }
    }

    fn name(&self) -> &str {
        self.path.file_name().unwrap().to_str().unwrap()
    }

    fn write_raw(&self, dataset: Dataset, filename: &str, content: &str) {
        std::fs::write(self.path.join(dataset.dir_name()).join(filename), content).unwrap();
    }

    fn write(&self, dataset: Dataset, filename: &str, rows: &[Cells]) {
        let header: Vec<&str> = rows[0].iter().map(|(k, _)| *k).collect();
        let mut content = header.join(",");
        content.push('\n');
        for row in rows {
            let values: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
            content.push_str(&values.join(","));
            content.push('\n');
        }
        self.write_raw(dataset, filename, &content);
    }

    fn write_pair(&self, filename: &str, meta: &[Cells], props: &[Cells]) {
        self.write(Dataset::Meta, filename, meta);
        self.write(Dataset::Props, filename, props);
    }

    fn validate(&self) -> ValidationReport {
        self.validate_with(&ValidateOptions::default())
    }

    fn validate_with(&self, options: &ValidateOptions) -> ValidationReport {
        validate_dir(&self.path, &schema(), options)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn messages(report: &ValidationReport) -> Vec<&str> {
    report.diagnostics.iter().map(|d| d.message.as_str()).collect()
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn well_formed_directory_is_valid() {
    let dir = ImageDir::new("TCGA-A1-A0SK");
    let file = roi_file(dir.name(), 5);
    let (meta, props) = good_rows();
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid, "{:#?}", messages(&report));
    assert_eq!(messages(&report).last(), Some(&"Data directory is valid"));
    assert!(report.mentions(&format!("Validating {file}")));

    let record = report.record.as_ref().unwrap();
    assert_eq!(record.image_name, "TCGA-A1-A0SK");
    assert_eq!(record.regions.len(), 1);

    let region = &record.regions[0];
    assert_eq!(region.name, "5");
    assert_eq!((region.left, region.top, region.right, region.bottom), (18001, 45779, 20049, 47827));
    assert_eq!(region.nuclei.len(), 3);

    let first = &region.nuclei[0];
    assert_eq!(first["Identifier_ObjectCode"], Value::Int(1));
    assert_eq!(first["Identifier_Xmin"], Value::Int(10));
    assert_eq!(first["Identifier_Xmax"], Value::Int(15));
    assert_eq!(first["Identifier_Ymax"], Value::Int(26));
    assert_eq!(first["Identifier_CentroidX"], Value::Int(12));
    assert_eq!(first["Classif_StandardClass"], Value::Text("TILsCell".into()));
    assert_eq!(first["Size_Area"], Value::Int(30));
    assert_eq!(first["Nucleus_Intensity_Mean"], Value::Float(101.25));
    assert!(!first.contains_key("slide"));
    assert!(!first.contains_key("roiname"));

    assert_eq!(report.summary.files, 1);
    assert_eq!(report.summary.files_failed, 0);
    assert_eq!(report.summary.regions, 1);
    assert_eq!(report.summary.nuclei, 3);
    assert_eq!(report.summary.errors, 0);
    assert_eq!(report.summary.warnings, 0);
    assert_eq!(report.meta.image_name, "TCGA-A1-A0SK");
}

#[cfg(unix)]
#[test]
fn symlinked_csv_is_paired_like_a_regular_file() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, props) = good_rows();
    dir.write(Dataset::Props, &file, &props);

    // Meta file lives elsewhere and is linked into nucleiMeta
    let store = TempDir::new().unwrap();
    let header: Vec<&str> = meta[0].iter().map(|(k, _)| *k).collect();
    let mut content = header.join(",");
    content.push('\n');
    for row in &meta {
        let values: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
        content.push_str(&values.join(","));
        content.push('\n');
    }
    let target = store.path().join(&file);
    std::fs::write(&target, content).unwrap();
    std::os::unix::fs::symlink(&target, dir.path().join(Dataset::Meta.dir_name()).join(&file)).unwrap();

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid, "{:#?}", messages(&report));
    assert!(!messages(&report).iter().any(|m| m.starts_with("Only in")));
    assert_eq!(report.summary.nuclei, 3);
}

#[test]
fn xmax_off_by_two_invalidates_only_that_identity() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    // props Xmax is 45, so meta should be 44
    set(&mut meta[1], "Identifier.Xmax", "46");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("meta[2][Xmax] and props[2][Xmax] are not off by one"));
    assert!(report.record.is_none());

    let integrity: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Integrity)
        .collect();
    assert_eq!(integrity.len(), 1);
    assert_eq!(integrity[0].path.identity, Some(2));
    assert_eq!(integrity[0].severity, Severity::Warning);

    // Other identities are still built
    assert_eq!(report.summary.nuclei, 3);
    assert_eq!(messages(&report).last(), Some(&"Data directory is invalid"));
}

#[test]
fn skip_missing_excludes_object_and_stays_valid() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    set(&mut props[1], "Size.Perimeter", "");
    dir.write_pair(&file, &meta, &props);

    let options = ValidateOptions { skip_missing: true, ..ValidateOptions::default() };
    let report = dir.validate_with(&options);
    assert_eq!(report.outcome, Outcome::Valid, "{:#?}", messages(&report));
    assert!(report.mentions("props[2][Size.Perimeter] is missing (skipping this record)"));

    let skip = report.diagnostics.iter().find(|d| d.kind == DiagnosticKind::Skip).unwrap();
    assert_eq!(skip.severity, Severity::Warning);

    let record = report.record.unwrap();
    let ids: Vec<&Value> = record.regions[0].nuclei.iter().map(|n| &n["Identifier_ObjectCode"]).collect();
    assert_eq!(ids, vec![&Value::Int(1), &Value::Int(3)]);
    assert_eq!(report.summary.nuclei_skipped, 1);
}

#[test]
fn missing_value_without_skip_is_an_error() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    set(&mut props[1], "Size.Perimeter", "");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("props[2][Size.Perimeter] is missing"));
    assert!(!report.mentions("skipping this record"));
    // Empty float cells are not conversion failures
    assert!(!report.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Conversion));
}

#[test]
fn duplicate_meta_identity_fails_file_before_cross_checks() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    set(&mut meta[2], "Identifier.ObjectCode", "1.0");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!("Duplicate ObjectCodes found in meta data for {file}")));
    assert!(report.mentions("ObjectCode 1 appears 2 times"));
    assert!(!report.mentions("do not match between meta and props"));
    assert!(!report.mentions("off by one"));
    assert_eq!(report.summary.regions, 0);
}

#[test]
fn duplicate_props_identity() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    set(&mut props[0], "Identifier.ObjectCode", "3.0");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!("Duplicate ObjectCodes found in props data for {file}")));
}

// -------------------------------------------------------------------------
// Directory structure
// -------------------------------------------------------------------------

#[test]
fn missing_directory() {
    let tmp = TempDir::new().unwrap();
    let report = validate_dir(&tmp.path().join("nonexisting"), &schema(), &ValidateOptions::default());
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("No such directory"));
}

#[test]
fn missing_meta_subdirectory() {
    let dir = ImageDir::new("img");
    std::fs::remove_dir(dir.path().join("nucleiMeta")).unwrap();

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Subdirectories nucleiMeta and nucleiProps must both exist"));
}

#[test]
fn nonmatching_file_sets_stop_before_parsing() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    dir.write_pair(&roi_file("img", 1), &meta, &props);
    dir.write(Dataset::Props, &roi_file("img", 2), &props);
    // Would produce parse diagnostics if it were read
    dir.write_raw(Dataset::Meta, &roi_file("img", 3), "garbage\n");
    dir.write_raw(Dataset::Props, &roi_file("img", 3), "other,garbage\n");

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Files in nucleiMeta and nucleiProps do not match"));
    assert!(report.mentions(&format!("Only in nucleiProps: {}", roi_file("img", 2))));
    assert!(!report.mentions("Validating"));
    assert_eq!(report.summary.files, 0);
}

#[test]
fn empty_directories_are_valid_with_advisory() {
    let dir = ImageDir::new("img");
    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid);
    assert!(report.mentions("No files found"));
    assert!(report.record.unwrap().regions.is_empty());
}

#[test]
fn bad_filename_fails_run_but_siblings_are_checked() {
    let dir = ImageDir::new("img");
    let good = roi_file("img", 1);
    let (meta, props) = good_rows();
    dir.write_pair("regex_mismatch.csv", &meta, &props);
    dir.write_pair(&good, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Filename regex_mismatch.csv does not match the pattern"));
    assert!(report.mentions(&format!("Validating {good}")));
    assert_eq!(report.summary.files, 2);
    assert_eq!(report.summary.files_failed, 1);
    assert_eq!(report.summary.regions, 1);
}

#[test]
fn image_name_mismatch_still_processes_rows() {
    let dir = ImageDir::new("mismatched_name");
    let file = "wrong_name_roi-5_left-18001_top-45779_right-20049_bottom-47827.csv";
    let (mut meta, props) = good_rows();
    set(&mut meta[0], "Identifier.Ymin", "21");
    dir.write_pair(file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!(
        "Image name for {file} does not match directory name mismatched_name"
    )));
    // Row-level problems in the same file are still found
    assert!(report.mentions("meta[1][Ymin] and props[1][Ymin] do not match"));
}

#[test]
fn field_set_mismatch_reports_both_datasets() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, mut props) = good_rows();
    for row in &mut meta {
        row.retain(|(k, _)| *k != "ClassifProbab.TILsCell");
    }
    for row in &mut props {
        row.push(("Size.Extra", "1".to_string()));
    }
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Fields mismatch: missing [ClassifProbab.TILsCell], extra []"));
    assert!(report.mentions(&format!("Meta fields for {file} do not match expected fields")));
    assert!(report.mentions("Fields mismatch: missing [], extra [Size.Extra]"));
    assert!(report.mentions(&format!("Props fields for {file} do not match expected fields")));
    assert!(!report.mentions("is missing"));
}

#[test]
fn field_set_failure_does_not_stop_sibling_files() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    let mut short_meta = meta.clone();
    for row in &mut short_meta {
        row.pop();
    }
    dir.write_pair(&roi_file("img", 1), &short_meta, &props);
    dir.write_pair(&roi_file("img", 2), &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert_eq!(report.summary.files_failed, 1);
    assert_eq!(report.summary.regions, 1);
}

#[test]
fn duplicate_header_is_structural() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    for row in &mut meta {
        row.push(("Identifier.Xmin", "0".to_string()));
    }
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!("Meta file {file} repeats fields: Identifier.Xmin")));
}

#[test]
fn overlong_row_is_an_integrity_error() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, props) = good_rows();
    dir.write(Dataset::Meta, &file, &meta);

    let header: Vec<&str> = props[0].iter().map(|(k, _)| *k).collect();
    let mut content = format!("{}\n", header.join(","));
    for (i, row) in props.iter().enumerate() {
        let mut values: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
        if i == 1 {
            values.push("surplus");
        }
        content.push_str(&values.join(","));
        content.push('\n');
    }
    dir.write_raw(Dataset::Props, &file, &content);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!("Props file {file} record 2 has more cells than the header")));
    // The row itself is kept with the extra cell dropped
    assert_eq!(report.summary.nuclei, 3);
}

// -------------------------------------------------------------------------
// Reconciliation and checks
// -------------------------------------------------------------------------

#[test]
fn mismatched_identity_sets() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    set(&mut props[2], "Identifier.ObjectCode", "4.0");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions(&format!("ObjectCodes in {file} do not match between meta and props")));
    assert!(report.mentions("ObjectCodes only in meta: 3"));
    assert!(report.mentions("ObjectCodes only in props: 4"));
}

#[test]
fn unreadable_identity_fails_file() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    set(&mut meta[0], "Identifier.ObjectCode", "1.5");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Value 1.5 is not a valid intfloat"));
    assert!(report.mentions(&format!("Unreadable ObjectCode in meta data for {file} (record 1: missing)")));
}

#[test]
fn broken_checks_report_every_violation() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, mut props) = good_rows();
    set(&mut meta[0], "ClassifProbab.TILsCell", "");
    set(&mut props[0], "Nucleus.Intensity.Mean", "");
    set(&mut meta[0], "Identifier.Xmin", "11");
    set(&mut meta[0], "Identifier.Ymin", "19");
    set(&mut meta[0], "Identifier.Xmax", "15");
    set(&mut meta[0], "Identifier.Ymax", "26");
    set(&mut meta[1], "Identifier.CentroidX", "43");
    set(&mut meta[1], "Identifier.CentroidY", "61");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    for expected in [
        "meta[1][ClassifProbab.TILsCell] is missing",
        "props[1][Nucleus.Intensity.Mean] is missing",
        "meta[1][Xmin] and props[1][Xmin] do not match",
        "meta[1][Ymin] and props[1][Ymin] do not match",
        "meta[1][Xmax] and props[1][Xmax] are not off by one",
        "meta[1][Ymax] and props[1][Ymax] are not off by one",
        "meta[2][Identifier.CentroidX] is not the floor of props[2][Identifier.CentroidX]",
        "meta[2][Identifier.CentroidY] is not the floor of props[2][Identifier.CentroidY]",
    ] {
        assert!(report.mentions(expected), "missing diagnostic: {expected}");
    }
    assert!(!report.mentions("meta[3]"));
}

#[test]
fn invalid_int_becomes_missing_value() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    set(&mut meta[0], "Identifier.Xmin", "abc");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    let conversion = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Conversion)
        .unwrap();
    assert_eq!(
        conversion.message,
        "Invalid int value: abc (field 'Identifier.Xmin', record 1)"
    );
    assert_eq!(conversion.path.dataset, Some(Dataset::Meta));
    assert!(report.mentions("meta[1][Identifier.Xmin] is missing"));
    // The null side of a relation is not compared
    assert!(!report.mentions("meta[1][Xmin] and props[1][Xmin] do not match"));
}

#[test]
fn invalid_enum_value() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (mut meta, props) = good_rows();
    set(&mut meta[2], "Classif.StandardClass", "Tumour");
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Invalid enum value 'Tumour'"));
    assert!(report.mentions("meta[3][Classif.StandardClass] is missing"));
}

// -------------------------------------------------------------------------
// Lint, fatal errors, multiple files, report shape
// -------------------------------------------------------------------------

#[test]
fn always_integral_float_field_is_advisory() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    for row in &mut props {
        set(row, "Nucleus.Intensity.Mean", "101.0");
    }
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid);
    let advisory = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Advisory)
        .unwrap();
    assert_eq!(
        advisory.message,
        "Float field 'Nucleus.Intensity.Mean' contains only int values (should it be a floatint?)"
    );
    assert_eq!(advisory.path.dataset, Some(Dataset::Props));

    let quiet = dir.validate_with(&ValidateOptions { intfloat_lint: false, ..ValidateOptions::default() });
    assert_eq!(quiet.outcome, Outcome::Valid);
    assert!(!quiet.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Advisory));
}

#[test]
fn all_nan_float_field_is_not_advisory() {
    let dir = ImageDir::new("img");
    let file = roi_file("img", 1);
    let (meta, mut props) = good_rows();
    for row in &mut props {
        set(row, "Nucleus.Intensity.Mean", "NaN");
    }
    dir.write_pair(&file, &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid, "{:#?}", messages(&report));
    assert!(!report.diagnostics.iter().any(|d| d.kind == DiagnosticKind::Advisory));
}

#[test]
fn schema_inconsistency_aborts_run() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    dir.write_pair(&roi_file("img", 1), &meta, &props);
    dir.write_pair(&roi_file("img", 2), &meta, &props);

    let mut schema = schema();
    schema.meta_types.enum_values.clear();

    let report = validate_dir(dir.path(), &schema, &ValidateOptions::default());
    assert_eq!(report.outcome, Outcome::Aborted);
    assert!(report.record.is_none());
    let fatal = report
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Fatal)
        .unwrap();
    assert_eq!(fatal.severity, Severity::Critical);
    assert!(fatal.message.contains("Classif.StandardClass"));
    // The second file is never reached
    assert!(!report.mentions(&format!("Validating {}", roi_file("img", 2))));
}

#[test]
fn multiple_regions_in_name_order() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    dir.write_pair(&roi_file("img", 7), &meta[..1], &props[..1]);
    dir.write_pair(&roi_file("img", 12), &meta, &props);

    let report = dir.validate();
    assert_eq!(report.outcome, Outcome::Valid);
    let record = report.record.unwrap();
    let names: Vec<&str> = record.regions.iter().map(|r| r.name.as_str()).collect();
    // "img_roi-12..." sorts before "img_roi-7..."
    assert_eq!(names, vec!["12", "7"]);
    assert_eq!(record.nucleus_count(), 4);
}

#[test]
fn report_serializes_to_json() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    dir.write_pair(&roi_file("img", 1), &meta, &props);

    let report = dir.validate();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"], "valid");
    assert_eq!(json["summary"]["nuclei"], 3);
    assert_eq!(json["meta"]["options"]["skip_missing"], false);
    assert_eq!(json["record"]["regions"][0]["nuclei"][0]["Identifier_Xmax"], 15);
    assert_eq!(json["diagnostics"][0]["severity"], "debug");
}

#[test]
fn schemas_coexist() {
    let dir = ImageDir::new("img");
    let (meta, props) = good_rows();
    dir.write_pair(&roi_file("img", 1), &meta, &props);

    let strict = schema();
    let mut loose = schema();
    loose.meta_only_fields.remove("ClassifProbab.TILsCell");

    assert_eq!(validate_dir(dir.path(), &strict, &ValidateOptions::default()).outcome, Outcome::Valid);
    let report = validate_dir(dir.path(), &loose, &ValidateOptions::default());
    assert_eq!(report.outcome, Outcome::Invalid);
    assert!(report.mentions("Fields mismatch: missing [], extra [ClassifProbab.TILsCell]"));
}
