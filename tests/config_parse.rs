use docbatch::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../docbatch.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(cfg.intake.max_files >= 1);
    assert!(!cfg.paths.out_dir.is_empty());
    assert_eq!(cfg.tools.repair.archive_name, "repaired_pdfs.zip");
    assert_eq!(cfg.tools.img2pdf.archive_name, "converted_images.zip");
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let raw = "[logging]\nlevel = \"debug\"\njson = false\nwrite_to_file = false\nfile_path = \"\"\n";
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.tools.extract.output_prefix, "extracted_");
    assert_eq!(cfg.engine.qpdf_exe, "auto");
    assert!(!cfg.engine.verify_output);
}

#[test]
fn load_reads_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docbatch.toml");
    std::fs::write(&path, "[archive]\ncompression = \"stored\"\n").unwrap();
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.archive.compression, "stored");
    assert!(Config::load(&dir.path().join("missing.toml")).is_err());
}

#[test]
fn effective_config_serializes_and_reparses() {
    let mut cfg = Config::default();
    cfg.debug.dump_effective_config = true;
    let raw = toml::to_string(&cfg).expect("serialize TOML");
    let back: Config = toml::from_str(&raw).expect("parse TOML");
    assert!(back.debug.dump_effective_config);
    assert_eq!(back.engine.repair_args, cfg.engine.repair_args);
}
