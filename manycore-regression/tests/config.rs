// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::io::Write;

use manycore_regression::config::{Overrides, RegressionConfig};
use manycore_sim::types::Coordinate;
use serial_test::serial;

fn write_conf(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn defaults_without_sources() {
    let config = RegressionConfig::load(None).unwrap();
    assert_eq!(config, RegressionConfig::default());
}

#[test]
#[serial]
fn toml_file_overrides_defaults() {
    let file = write_conf(
        r#"
        timeout_cycles = 5000

        [manycore]
        dmem_size_bytes = 2048
        dimension_vcore = { x = 2, y = 1 }

        [linear_inorder]
        nels = 64
        stride = 3

        [log]
        stdout_level = "debug"
        "#,
    );
    let config = RegressionConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.timeout_cycles, Some(5000));
    assert_eq!(config.manycore.dmem_size_bytes, 2048);
    assert_eq!(config.manycore.dimension_vcore, Coordinate::new(2, 1));
    assert_eq!(config.manycore.origin_vcore, Coordinate::new(0, 1));
    assert_eq!(config.linear_inorder.nels, 64);
    assert_eq!(config.linear_inorder.stride, 3);
    assert_eq!(config.linear_inorder.niters, 1024);
    assert_eq!(config.log.stdout_level, log::Level::Debug);
}

#[test]
#[serial]
fn environment_overrides_file() {
    let file = write_conf("[test_dram]\nlen = 10\n");
    // SAFETY: tests touching the environment are serialised
    unsafe {
        std::env::set_var("MANYCORE_TEST_DRAM__LEN", "20");
    }
    let config = RegressionConfig::load(Some(file.path()));
    unsafe {
        std::env::remove_var("MANYCORE_TEST_DRAM__LEN");
    }
    assert_eq!(config.unwrap().test_dram.len, 20);
}

#[test]
#[serial]
fn command_line_has_the_last_word() {
    let file = write_conf("[linear_inorder]\npto = 2\n");
    let mut config = RegressionConfig::load(Some(file.path())).unwrap();
    config.apply_overrides(&Overrides {
        pto: Some(7),
        dram_len: Some(8),
        ..Default::default()
    });
    assert_eq!(config.linear_inorder.pto, 7);
    assert_eq!(config.test_dram.len, 8);
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    assert!(RegressionConfig::load(Some(&missing)).is_err());
}

#[test]
#[serial]
fn bad_values_are_errors() {
    let file = write_conf("[linear_inorder]\nnels = \"lots\"\n");
    assert!(RegressionConfig::load(Some(file.path())).is_err());
}
