//! FILENAME: tests/common/mod.rs
//! Fixtures for engine integration tests: sample Tableau documents and
//! helpers that write them to a temporary directory.

#![allow(dead_code)]

use engine::{MappingConfig, MemorySink, MigrationEngine, MigrationSettings};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One datasource whose only column is a calculated field.
pub const ONE_FIELD_TWB: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook source-build='2023.1.0' version='18.1'>
  <datasources>
    <datasource caption='Superstore' inline='true' name='federated.1' version='18.1'>
      <connection class='excel-direct' filename='Superstore.xls' />
      <column caption='Profit Ratio' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
    </datasource>
  </datasources>
</workbook>
"#;

/// A SQL Server datasource, four calculated fields (one empty) and a bar chart.
pub const SALES_TWB: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook source-build='2023.1.0' version='18.1'>
  <datasources>
    <datasource caption='Orders' inline='true' name='sqlserver.orders' version='18.1'>
      <connection class='sqlserver' dbname='Sales' server='db01' authentication='sspi' />
      <relation name='Orders' table='[dbo].[Orders]' type='table' />
      <column datatype='real' name='[Sales]' role='measure' type='quantitative' />
      <column datatype='string' name='[Region]' role='dimension' type='nominal' />
      <column caption='Profit Ratio' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
      <column caption='Regional Sales' datatype='real' name='[Calculation_2]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='{FIXED [Region] : SUM([Sales])}' />
      </column>
      <column caption='Placeholder' datatype='real' name='[Calculation_3]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='' />
      </column>
      <column caption='Sales Band' datatype='string' name='[Calculation_4]' role='dimension' type='nominal'>
        <calculation class='tableau' formula="IF [Sales] &gt; 100 THEN 'High' ELSE 'Low' END" />
      </column>
    </datasource>
  </datasources>
  <worksheets>
    <worksheet name='Sales by Region'>
      <table>
        <view>
          <datasources>
            <datasource caption='Orders' name='sqlserver.orders' />
          </datasources>
        </view>
        <panes>
          <pane>
            <mark class='Bar' />
          </pane>
        </panes>
        <rows>[sqlserver.orders].[none:Region:nk]</rows>
        <cols>[sqlserver.orders].[sum:Sales:qk]</cols>
      </table>
    </worksheet>
  </worksheets>
</workbook>
"#;

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
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

/// Engine with built-in mappings writing into `output_dir`.
pub fn engine(output_dir: &Path) -> MigrationEngine {
    let settings = MigrationSettings {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };
    MigrationEngine::with_config(settings, Arc::new(MappingConfig::builtin()))
}

pub fn sink() -> Arc<MemorySink> {
    Arc::new(MemorySink::new())
}
