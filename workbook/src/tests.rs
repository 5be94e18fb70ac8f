//! FILENAME: workbook/src/tests.rs
//! PURPOSE: Unit tests for the XML tree and the extraction rules.

use crate::extract::{
    detect_version, extract_calculated_fields, extract_dashboards, extract_datasources,
    extract_filters, extract_parameters, extract_worksheets,
};
use crate::xml::parse_document;

// ========================================
// XML TREE TESTS
// ========================================

#[test]
fn parses_nested_elements_and_attributes() {
    let root = parse_document(
        r#"<?xml version='1.0' encoding='utf-8' ?>
        <workbook version='18.1'>
          <!-- comment -->
          <a x='1'><b>text &amp; more</b><b/></a>
        </workbook>"#,
    )
    .unwrap();

    assert_eq!(root.name, "workbook");
    assert_eq!(root.attr("version"), Some("18.1"));
    let a = root.child("a").unwrap();
    assert_eq!(a.attr("x"), Some("1"));
    assert_eq!(a.children_named("b").count(), 2);
    assert_eq!(a.children[0].text, "text & more");
}

#[test]
fn unescapes_attribute_values() {
    let root = parse_document(r#"<c formula='IF [a] &gt; 1 THEN &quot;x&quot; END'/>"#).unwrap();
    assert_eq!(root.attr("formula"), Some(r#"IF [a] > 1 THEN "x" END"#));
}

#[test]
fn descendants_keep_document_order() {
    let root = parse_document("<r><c n='1'><c n='2'/></c><d><c n='3'/></d></r>").unwrap();
    let names: Vec<&str> = root
        .descendants_named("c")
        .iter()
        .filter_map(|c| c.attr("n"))
        .collect();
    assert_eq!(names, vec!["1", "2", "3"]);
}

#[test]
fn self_is_included_only_when_asked() {
    let root = parse_document("<datasource name='x'><datasource name='y'/></datasource>").unwrap();
    assert_eq!(root.descendants_named("datasource").len(), 1);
    assert_eq!(root.self_and_descendants_named("datasource").len(), 2);
}

#[test]
fn rejects_mismatched_tags() {
    assert!(parse_document("<a><b></a>").is_err());
}

#[test]
fn rejects_unclosed_root() {
    assert!(parse_document("<a><b/>").is_err());
}

#[test]
fn rejects_plain_text() {
    assert!(parse_document("this is not xml").is_err());
    assert!(parse_document("").is_err());
}

#[test]
fn reads_cdata_as_text() {
    let root = parse_document("<calculation><![CDATA[SUM([a]) < 1]]></calculation>").unwrap();
    assert_eq!(root.text, "SUM([a]) < 1");
}

// ========================================
// EXTRACTION TESTS
// ========================================

const WORKBOOK: &str = r##"<?xml version='1.0' encoding='utf-8' ?>
<workbook version='2023.1'>
  <datasources>
    <datasource name='Parameters' inline='true'>
      <column caption='Top N' datatype='integer' name='[Parameter 1]' param-domain-type='range' role='measure' type='quantitative' value='10'>
        <calculation class='tableau' formula='10' />
        <members>
          <member alias='Ten' value='10' />
        </members>
      </column>
    </datasource>
    <datasource caption='Orders' name='sqlserver.1' version='18.1'>
      <connection class='sqlserver' dbname='Sales' server='db01' port='1433'>
        <relation name='Orders' table='[dbo].[Orders]' type='table' />
      </connection>
      <aliases>
        <alias key='"E"' value='East' />
        <alias key='' value='ignored' />
      </aliases>
      <column datatype='real' name='[Sales]' role='measure' type='quantitative' default-format='c"$"#,##0' />
      <column datatype='string' name='[State]' role='dimension' type='nominal' semantic-role='[State].[Name]' geographic-role='State' hidden='true' />
      <column caption='Profit Ratio' datatype='real' name='[Calculation_1]' role='measure' type='quantitative'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
    </datasource>
  </datasources>
  <worksheets>
    <worksheet name='Sales by Region'>
      <table>
        <view>
          <datasources>
            <datasource caption='Orders' name='sqlserver.1' />
          </datasources>
          <filter class='categorical' column='[sqlserver.1].[Region]' />
          <shelf-sorts>
            <shelf-sort-rule field='[sqlserver.1].[Sales]' is-ascending='false' />
            <shelf-sort-rule field='[sqlserver.1].[Region]' />
          </shelf-sorts>
        </view>
        <panes>
          <pane><mark class='Bar' /></pane>
          <pane><mark class='Bar' /></pane>
        </panes>
        <rows>[sqlserver.1].[none:Region:nk]</rows>
        <cols>[sqlserver.1].[sum:Sales:qk]</cols>
      </table>
    </worksheet>
    <worksheet name='Empty' />
  </worksheets>
  <dashboards>
    <dashboard name='Overview'>
      <size maxheight='800' maxwidth='1000' minheight='800' minwidth='1000' />
      <zones>
        <zone h='100000' id='3' type='layout-basic' w='100000' x='0' y='0' />
        <zone id='4' name='Sales by Region' x='10' y='20' w='30' h='40' />
      </zones>
    </dashboard>
  </dashboards>
</workbook>"##;

#[test]
fn detects_version_from_root_then_element() {
    let root = parse_document(WORKBOOK).unwrap();
    assert_eq!(detect_version(&root), "2023.1");

    let nested = parse_document("<workbook><meta><version> 10.5 </version></meta></workbook>").unwrap();
    assert_eq!(detect_version(&nested), "10.5");

    let none = parse_document("<workbook/>").unwrap();
    assert_eq!(detect_version(&none), "unknown");
}

#[test]
fn extracts_datasources_in_document_order() {
    let root = parse_document(WORKBOOK).unwrap();
    let datasources = extract_datasources(&root);

    // The two definitions plus the worksheet's reference
    assert_eq!(datasources.len(), 3);
    assert_eq!(datasources[0].name, "Parameters");
    assert!(datasources[0].inline);

    let orders = &datasources[1];
    assert_eq!(orders.caption, "Orders");
    assert_eq!(orders.version, "18.1");
    assert_eq!(orders.connections.len(), 1);
    assert_eq!(orders.connections[0].class, "sqlserver");
    assert_eq!(orders.connections[0].port, "1433");
    assert_eq!(
        orders.connections[0].properties.get("dbname").map(String::as_str),
        Some("Sales")
    );
    assert_eq!(orders.relations[0].table, "[dbo].[Orders]");
    assert_eq!(orders.aliases.len(), 1);
    assert_eq!(orders.aliases.get("\"E\"").map(String::as_str), Some("East"));
}

#[test]
fn extracts_column_details() {
    let root = parse_document(WORKBOOK).unwrap();
    let datasources = extract_datasources(&root);
    let columns = &datasources[1].columns;

    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].default_format, r##"c"$"#,##0"##);
    assert!(columns[0].calculation.is_none());
    assert!(columns[1].hidden);
    assert_eq!(columns[1].geographic_role, "State");
    assert_eq!(columns[1].semantic_role, "[State].[Name]");
    let calc = columns[2].calculation.as_ref().unwrap();
    assert_eq!(calc.formula, "SUM([Profit])/SUM([Sales])");
    assert_eq!(calc.class, "tableau");
}

#[test]
fn extracts_worksheet_view() {
    let root = parse_document(WORKBOOK).unwrap();
    let worksheets = extract_worksheets(&root);

    assert_eq!(worksheets.len(), 2);
    let view = &worksheets[0].view;
    assert_eq!(view.datasource_refs, vec!["sqlserver.1".to_string()]);
    assert_eq!(view.sorts.len(), 2);
    assert!(!view.sorts[0].ascending);
    assert!(view.sorts[1].ascending);
    assert_eq!(view.filters.len(), 1);
    assert_eq!(view.filters[0].class, "categorical");
    assert_eq!(view.marks, vec!["Bar".to_string()]);
    assert_eq!(
        view.shelves.get("rows"),
        Some(&vec!["[sqlserver.1].[none:Region:nk]".to_string()])
    );
    assert!(view.shelves.contains_key("columns"));

    // No view: empty structure, no failure
    assert_eq!(worksheets[1].view, crate::View::default());
}

#[test]
fn extracts_dashboards() {
    let root = parse_document(WORKBOOK).unwrap();
    let dashboards = extract_dashboards(&root);

    assert_eq!(dashboards.len(), 1);
    assert_eq!(dashboards[0].size.as_ref().unwrap().maxwidth, "1000");
    assert_eq!(dashboards[0].zones.len(), 2);
    assert_eq!(dashboards[0].zones[1].name, "Sales by Region");
    assert_eq!(dashboards[0].zones[0].zone_type, "layout-basic");
}

#[test]
fn extracts_parameters() {
    let root = parse_document(WORKBOOK).unwrap();
    let parameters = extract_parameters(&root);

    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].caption, "Top N");
    assert_eq!(parameters[0].param_domain_type, "range");
    assert_eq!(parameters[0].value, "10");
    assert_eq!(parameters[0].members[0].alias, "Ten");
}

#[test]
fn extracts_calculated_fields_flat() {
    let root = parse_document(WORKBOOK).unwrap();
    let fields = extract_calculated_fields(&root);

    // The parameter column carries a calculation too
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1].name, "[Calculation_1]");
    assert_eq!(fields[1].display_name(), "Profit Ratio");
    assert_eq!(fields[1].effective_formula(), "SUM([Profit])/SUM([Sales])");
    assert_eq!(fields[1].formula_class, "tableau");
}

#[test]
fn extracts_workbook_filters() {
    let root = parse_document(WORKBOOK).unwrap();
    let filters = extract_filters(&root);
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].column, "[sqlserver.1].[Region]");
}

#[test]
fn missing_containers_yield_empty_lists() {
    let root = parse_document("<workbook version='8.0'/>").unwrap();
    assert!(extract_datasources(&root).is_empty());
    assert!(extract_worksheets(&root).is_empty());
    assert!(extract_dashboards(&root).is_empty());
    assert!(extract_parameters(&root).is_empty());
    assert!(extract_calculated_fields(&root).is_empty());
}

#[test]
fn datasource_document_root_counts() {
    let root = parse_document(
        "<datasource name='Extract' version='18.1'><connection class='hyper'/></datasource>",
    )
    .unwrap();
    let datasources = extract_datasources(&root);
    assert_eq!(datasources.len(), 1);
    assert_eq!(datasources[0].connections[0].class, "hyper");
}
