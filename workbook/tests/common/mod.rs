//! FILENAME: tests/common/mod.rs
//! Fixtures for workbook integration tests: sample documents and helpers
//! that write them to a temporary directory as plain or packaged files.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One datasource, one regular column, one calculated field.
pub const MINIMAL_TWB: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook source-build='2023.1.0' version='18.1'>
  <datasources>
    <datasource caption='Superstore' inline='true' name='federated.1' version='18.1'>
      <connection class='excel-direct' filename='Superstore.xls' />
      <column datatype='real' name='[Sales]' role='measure' type='quantitative' />
      <column caption='Profit Ratio' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
    </datasource>
  </datasources>
</workbook>
"#;

pub const MINIMAL_TDS: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<datasource formatted-name='Orders' inline='true' version='18.1'>
  <connection class='postgres' dbname='shop' server='pg01' port='5432' />
  <column datatype='integer' name='[Quantity]' role='measure' type='quantitative' />
</datasource>
"#;

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes a zip package whose members appear in the given order.
pub fn write_package(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (member, contents) in members {
        writer.start_file(*member, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
    path
}
