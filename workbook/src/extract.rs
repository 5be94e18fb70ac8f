//! FILENAME: workbook/src/extract.rs
//! PURPOSE: Turns a parsed XML tree into the typed workbook model.
//! CONTEXT: Tableau documents vary a lot between versions and between
//! workbooks and data sources. Every rule here tolerates missing structure
//! and yields empty values instead of failing.

use crate::model::{
    CalculatedField, Calculation, Column, Connection, Dashboard, DashboardSize, DataSource,
    FileInfo, Filter, Parameter, ParameterMember, ParsedWorkbook, Relation, SortRule, View,
    Worksheet, Zone,
};
use crate::xml::XmlElement;
use std::collections::BTreeMap;

/// Extracts every component. The version is detected but not checked.
pub fn extract_workbook(root: &XmlElement, file_info: FileInfo) -> ParsedWorkbook {
    ParsedWorkbook {
        file_info,
        tableau_version: detect_version(root),
        datasources: extract_datasources(root),
        worksheets: extract_worksheets(root),
        dashboards: extract_dashboards(root),
        parameters: extract_parameters(root),
        calculated_fields: extract_calculated_fields(root),
        filters: extract_filters(root),
    }
}

/// Root `version` attribute, else the first <version> element's text, else "unknown".
pub fn detect_version(root: &XmlElement) -> String {
    if let Some(version) = root.attr("version").filter(|v| !v.is_empty()) {
        return version.to_string();
    }
    root.find_descendant("version")
        .map(|el| el.text.trim())
        .filter(|text| !text.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

// ============================================================================
// DATASOURCES
// ============================================================================

/// Every <datasource> in the document. A .tds root is itself a datasource.
pub fn extract_datasources(root: &XmlElement) -> Vec<DataSource> {
    root.self_and_descendants_named("datasource")
        .into_iter()
        .map(|ds| DataSource {
            name: ds.attr("name").unwrap_or("Unknown").to_string(),
            caption: ds.attr_or_empty("caption"),
            version: ds.attr_or_empty("version"),
            inline: ds.attr_flag("inline", false),
            connections: ds
                .descendants_named("connection")
                .into_iter()
                .map(extract_connection)
                .collect(),
            columns: ds
                .descendants_named("column")
                .into_iter()
                .map(extract_column)
                .collect(),
            relations: ds
                .descendants_named("relation")
                .into_iter()
                .map(extract_relation)
                .collect(),
            aliases: extract_aliases(ds),
        })
        .collect()
}

fn extract_connection(el: &XmlElement) -> Connection {
    Connection {
        class: el.attr_or_empty("class"),
        server: el.attr_or_empty("server"),
        dbname: el.attr_or_empty("dbname"),
        username: el.attr_or_empty("username"),
        authentication: el.attr_or_empty("authentication"),
        port: el.attr_or_empty("port"),
        schema: el.attr_or_empty("schema"),
        warehouse: el.attr_or_empty("warehouse"),
        service: el.attr_or_empty("service"),
        filename: el.attr_or_empty("filename"),
        directory: el.attr_or_empty("directory"),
        properties: el.attributes.iter().cloned().collect(),
    }
}

fn extract_column(el: &XmlElement) -> Column {
    Column {
        name: el.attr_or_empty("name"),
        caption: el.attr_or_empty("caption"),
        datatype: el.attr_or_empty("datatype"),
        role: el.attr_or_empty("role"),
        column_type: el.attr_or_empty("type"),
        aggregation: el.attr_or_empty("aggregation"),
        hidden: el.attr_flag("hidden", false),
        calculation: el.child("calculation").map(|calc| Calculation {
            class: calc.attr_or_empty("class"),
            formula: calc.attr_or_empty("formula"),
            formula_text: calc.text.clone(),
        }),
        default_format: el.attr_or_empty("default-format"),
        semantic_role: el.attr_or_empty("semantic-role"),
        geographic_role: el.attr_or_empty("geographic-role"),
    }
}

fn extract_relation(el: &XmlElement) -> Relation {
    Relation {
        connection: el.attr_or_empty("connection"),
        name: el.attr_or_empty("name"),
        table: el.attr_or_empty("table"),
        relation_type: el.attr_or_empty("type"),
        join: el.attr_or_empty("join"),
        text: el.text.clone(),
    }
}

fn extract_aliases(ds: &XmlElement) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    if let Some(container) = ds.child("aliases") {
        for alias in container.children_named("alias") {
            let key = alias.attr_or_empty("key");
            let value = alias.attr_or_empty("value");
            if !key.is_empty() && !value.is_empty() {
                aliases.insert(key, value);
            }
        }
    }
    aliases
}

// ============================================================================
// WORKSHEETS
// ============================================================================

pub fn extract_worksheets(root: &XmlElement) -> Vec<Worksheet> {
    let Some(container) = root.child("worksheets") else {
        return Vec::new();
    };

    container
        .children_named("worksheet")
        .map(|ws| Worksheet {
            name: ws.attr_or_empty("name"),
            view: extract_view(ws),
        })
        .collect()
}

fn extract_view(ws: &XmlElement) -> View {
    let Some(view) = ws.find_descendant("view") else {
        return View::default();
    };

    let datasource_refs: Vec<String> = view
        .child("datasources")
        .map(|dss| {
            dss.children_named("datasource")
                .filter_map(|ds| ds.attr("name").filter(|n| !n.is_empty()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut shelves: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(container) = view.child("shelves") {
        for shelf in container.children_named("shelf") {
            let fields = shelf
                .children_named("field")
                .map(|f| f.text.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
            shelves.insert(shelf.attr_or_empty("name"), fields);
        }
    }

    // The worksheet table layout carries the row and column shelves
    for (tag, shelf) in [("rows", "rows"), ("cols", "columns")] {
        if let Some(text) = ws
            .find_descendant(tag)
            .map(|el| el.text.trim())
            .filter(|t| !t.is_empty())
        {
            shelves
                .entry(shelf.to_string())
                .or_insert_with(|| vec![text.to_string()]);
        }
    }

    let sorts: Vec<SortRule> = view
        .child("shelf-sorts")
        .map(|container| {
            container
                .children_named("shelf-sort-rule")
                .map(|rule| SortRule {
                    field: rule.attr_or_empty("field"),
                    ascending: rule.attr_flag("is-ascending", true),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut marks: Vec<String> = Vec::new();
    for mark in ws.descendants_named("mark") {
        if let Some(class) = mark.attr("class").filter(|c| !c.is_empty()) {
            if !marks.iter().any(|m| m == class) {
                marks.push(class.to_string());
            }
        }
    }

    View {
        datasource_refs,
        shelves,
        filters: view.descendants_named("filter").into_iter().map(to_filter).collect(),
        sorts,
        marks,
    }
}

fn to_filter(el: &XmlElement) -> Filter {
    Filter {
        class: el.attr_or_empty("class"),
        column: el.attr_or_empty("column"),
    }
}

/// Every <filter> in the document, wherever it sits.
pub fn extract_filters(root: &XmlElement) -> Vec<Filter> {
    root.descendants_named("filter")
        .into_iter()
        .map(to_filter)
        .collect()
}

// ============================================================================
// DASHBOARDS
// ============================================================================

pub fn extract_dashboards(root: &XmlElement) -> Vec<Dashboard> {
    let Some(container) = root.child("dashboards") else {
        return Vec::new();
    };

    container
        .children_named("dashboard")
        .map(|db| Dashboard {
            name: db.attr_or_empty("name"),
            size: db.child("size").map(|size| DashboardSize {
                maxheight: size.attr_or_empty("maxheight"),
                maxwidth: size.attr_or_empty("maxwidth"),
                minheight: size.attr_or_empty("minheight"),
                minwidth: size.attr_or_empty("minwidth"),
            }),
            zones: db
                .child("zones")
                .map(|zones| {
                    zones
                        .children_named("zone")
                        .map(|zone| Zone {
                            id: zone.attr_or_empty("id"),
                            name: zone.attr_or_empty("name"),
                            zone_type: zone.attr_or_empty("type"),
                            param: zone.attr_or_empty("param"),
                            x: zone.attr_or_empty("x"),
                            y: zone.attr_or_empty("y"),
                            w: zone.attr_or_empty("w"),
                            h: zone.attr_or_empty("h"),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

// ============================================================================
// PARAMETERS & CALCULATED FIELDS
// ============================================================================

/// Columns carrying a `param-domain-type` attribute.
pub fn extract_parameters(root: &XmlElement) -> Vec<Parameter> {
    root.descendants_named("column")
        .into_iter()
        .filter(|col| col.has_attr("param-domain-type"))
        .map(|col| Parameter {
            name: col.attr_or_empty("name"),
            caption: col.attr_or_empty("caption"),
            datatype: col.attr_or_empty("datatype"),
            param_domain_type: col.attr_or_empty("param-domain-type"),
            value: col.attr_or_empty("value"),
            members: col
                .child("members")
                .map(|members| {
                    members
                        .children_named("member")
                        .map(|m| ParameterMember {
                            alias: m.attr_or_empty("alias"),
                            value: m.attr_or_empty("value"),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// Columns with a direct <calculation> child, as one flat list.
pub fn extract_calculated_fields(root: &XmlElement) -> Vec<CalculatedField> {
    root.descendants_named("column")
        .into_iter()
        .filter_map(|col| {
            let calc = col.child("calculation")?;
            Some(CalculatedField {
                name: col.attr_or_empty("name"),
                caption: col.attr_or_empty("caption"),
                datatype: col.attr_or_empty("datatype"),
                role: col.attr_or_empty("role"),
                field_type: col.attr_or_empty("type"),
                formula: calc.attr_or_empty("formula"),
                formula_class: calc.attr_or_empty("class"),
                formula_text: calc.text.clone(),
            })
        })
        .collect()
}
