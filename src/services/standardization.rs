//! Standardization spec assembler.
//!
//! Composes every analyzer into one capped, sorted, deterministic report.
//! Each section is either supplied by the caller, computed from SQL, or
//! reported as unavailable; the three states are explicit rather than
//! duck-typed.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::services::analyzer;
use crate::services::business_rules;
use crate::services::db_dependency;
use crate::services::mapping_strategy::{self, APPROACH_CALL_SP_FIRST, APPROACH_REWRITE};
use crate::services::mybatis_difficulty;
use crate::services::performance_risk;
use crate::services::retrieval::{
    PatternRecommendation, RetrieverCache, build_pattern_recommendations, build_snippet,
    extract_query_terms,
};
use crate::services::reusability::Recommendation;
use crate::services::safe_sql::summarize;
use crate::services::tx_boundary;
use crate::utils::sorted_unique;

pub const VERSION: &str = "5.1.0";
pub const VERSION_WITH_EVIDENCE: &str = "5.2.0";

pub const ALL_SECTIONS: &[&str] = &[
    "references",
    "transactions",
    "migration_impacts",
    "control_flow",
    "data_changes",
    "error_handling",
    "business_rules",
    "mybatis_strategy",
    "tx_boundary",
    "difficulty",
    "perf_risk",
    "db_dependency",
];

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct SpecOptions {
    pub dialect: String,
    pub case_insensitive: bool,
    pub include_sections: Option<Vec<String>>,
    pub max_items_per_section: usize,
}

impl Default for SpecOptions {
    fn default() -> Self {
        Self {
            dialect: "tsql".to_string(),
            case_insensitive: true,
            include_sections: None,
            max_items_per_section: 50,
        }
    }
}

/// Precomputed section payloads supplied instead of SQL.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SpecInputs {
    #[schema(value_type = Object)]
    pub analyze: Option<Value>,
    #[schema(value_type = Object)]
    pub business_rules: Option<Value>,
    #[schema(value_type = Object)]
    pub mybatis_strategy: Option<Value>,
    #[schema(value_type = Object)]
    pub tx_boundary: Option<Value>,
    #[schema(value_type = Object)]
    pub difficulty: Option<Value>,
    #[schema(value_type = Object)]
    pub perf_risk: Option<Value>,
    #[schema(value_type = Object)]
    pub db_dependency: Option<Value>,
}

/// One assembled section: supplied, computed, or absent.
enum Section {
    Given(Value),
    Computed(Value),
    Missing,
}

impl Section {
    fn value(&self) -> Option<&Value> {
        match self {
            Section::Given(value) | Section::Computed(value) => Some(value),
            Section::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub normalized: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecSummary {
    pub one_liner: String,
    pub risk_level: String,
    pub difficulty_level: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecTemplate {
    pub id: String,
    pub source: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecRule {
    pub id: String,
    pub kind: String,
    pub condition: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecDependencies {
    pub tables: Vec<String>,
    pub functions: Vec<String>,
    pub cross_db: Vec<String>,
    pub linked_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecTransactions {
    pub recommended_boundary: Option<String>,
    pub propagation: Option<String>,
    pub isolation_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecMybatis {
    pub approach: String,
    pub difficulty_score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecRisks {
    pub migration_impacts: Vec<String>,
    pub performance: Vec<String>,
    pub db_dependency: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecEvidenceSignals {
    pub table_count: usize,
    pub cyclomatic_complexity: i64,
    pub has_writes: bool,
    pub uses_transaction: bool,
    pub has_try_catch: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecEvidenceBlock {
    pub signals: SpecEvidenceSignals,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecBody {
    pub tags: Vec<String>,
    pub summary: SpecSummary,
    pub templates: Vec<SpecTemplate>,
    pub rules: Vec<SpecRule>,
    pub dependencies: SpecDependencies,
    pub transactions: SpecTransactions,
    pub mybatis: SpecMybatis,
    pub risks: SpecRisks,
    pub recommendations: Vec<Recommendation>,
    pub evidence: SpecEvidenceBlock,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecReport {
    pub version: String,
    pub object: SpecObject,
    pub spec: SpecBody,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvidenceDocument {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub score: f64,
    pub snippet: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Evidence {
    pub documents: Vec<EvidenceDocument>,
    pub pattern_recommendations: Vec<PatternRecommendation>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpecWithEvidenceReport {
    pub version: String,
    pub object: SpecObject,
    pub spec: SpecBody,
    pub evidence: Evidence,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(default)]
pub struct EvidenceOptions {
    pub docs_dir: Option<String>,
    pub top_k: usize,
    pub max_snippet_chars: usize,
}

impl Default for EvidenceOptions {
    fn default() -> Self {
        Self { docs_dir: None, top_k: 5, max_snippet_chars: 280 }
    }
}

#[allow(clippy::too_many_lines)]
pub fn build_standardization_spec(
    name: &str,
    object_type: &str,
    sql: Option<&str>,
    inputs: Option<&SpecInputs>,
    options: &SpecOptions,
) -> SpecReport {
    let include_sections = normalize_sections(options.include_sections.as_deref());
    let max_items = options.max_items_per_section;
    let mut errors: Vec<String> = Vec::new();

    match sql {
        Some(sql) => {
            let summary = summarize(sql);
            tracing::info!(
                sql_len = summary.len,
                sql_hash = %summary.sha256_8,
                object_type = object_type,
                "build_standardization_spec"
            );
        }
        None => {
            tracing::info!(object_type = object_type, "build_standardization_spec inputs_only");
        }
    }

    let analyze_inputs = inputs.and_then(|inputs| inputs.analyze.as_ref());
    let input_for = |key: &str| {
        analyze_inputs
            .and_then(|value| value.get(key))
            .cloned()
    };

    let references = resolve(
        "references",
        &include_sections,
        &mut errors,
        input_for("references"),
        sql.map(|sql| to_value(analyzer::analyze_references(sql, &options.dialect))),
    );
    let transactions = resolve(
        "transactions",
        &include_sections,
        &mut errors,
        input_for("transactions"),
        sql.map(|sql| to_value(analyzer::analyze_transactions(sql))),
    );
    let migration_impacts = resolve(
        "migration_impacts",
        &include_sections,
        &mut errors,
        input_for("migration_impacts"),
        sql.map(|sql| to_value(analyzer::analyze_migration_impacts(sql))),
    );
    let control_flow = resolve(
        "control_flow",
        &include_sections,
        &mut errors,
        input_for("control_flow"),
        sql.map(|sql| to_value(analyzer::analyze_control_flow(sql, &options.dialect))),
    );
    let data_changes = resolve(
        "data_changes",
        &include_sections,
        &mut errors,
        input_for("data_changes"),
        sql.map(|sql| to_value(analyzer::analyze_data_changes(sql, &options.dialect))),
    );
    let error_handling = resolve(
        "error_handling",
        &include_sections,
        &mut errors,
        input_for("error_handling"),
        sql.map(|sql| to_value(analyzer::analyze_error_handling(sql))),
    );

    extend_errors(&mut errors, analyze_inputs);
    extend_errors(&mut errors, references.value());
    extend_errors(&mut errors, control_flow.value());
    extend_errors(&mut errors, data_changes.value());

    let references = unwrap_section(references, "references");
    let control_flow = unwrap_section(control_flow, "control_flow");
    let data_changes = unwrap_section(data_changes, "data_changes");

    let business_rules = resolve(
        "business_rules",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.business_rules.clone()),
        sql.map(|sql| {
            to_value(business_rules::analyze_business_rules(
                name,
                object_type,
                sql,
                &options.dialect,
                options.case_insensitive,
                max_items,
                max_items,
            ))
        }),
    );
    let mapping_strategy = resolve(
        "mybatis_strategy",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.mybatis_strategy.clone()),
        sql.map(|sql| {
            to_value(mapping_strategy::recommend_mapping_strategy(
                name,
                object_type,
                sql,
                &options.dialect,
                APPROACH_REWRITE,
                max_items,
            ))
        }),
    );
    let tx_boundary = resolve(
        "tx_boundary",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.tx_boundary.clone()),
        sql.map(|sql| {
            to_value(tx_boundary::recommend_transaction_boundary(
                name,
                object_type,
                sql,
                &options.dialect,
                max_items,
            ))
        }),
    );
    let difficulty = resolve(
        "difficulty",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.difficulty.clone()),
        sql.map(|sql| {
            to_value(mybatis_difficulty::evaluate_mybatis_difficulty(
                name,
                object_type,
                sql,
                &options.dialect,
                options.case_insensitive,
                max_items,
            ))
        }),
    );
    let perf_risk = resolve(
        "perf_risk",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.perf_risk.clone()),
        sql.map(|sql| {
            to_value(performance_risk::analyze_performance_risk(
                name,
                object_type,
                sql,
                &options.dialect,
                max_items,
            ))
        }),
    );
    let db_dependency = resolve(
        "db_dependency",
        &include_sections,
        &mut errors,
        inputs.and_then(|inputs| inputs.db_dependency.clone()),
        sql.map(|sql| {
            to_value(db_dependency::analyze_db_dependency(
                name,
                object_type,
                sql,
                &options.dialect,
                options.case_insensitive,
                max_items,
            ))
        }),
    );

    let has_writes = get_bool(data_changes.as_ref(), &["has_writes"]);
    let uses_transaction = get_bool(transactions.value(), &["uses_transaction"]);
    let cyclomatic_complexity = get_i64(control_flow.as_ref(), &["summary", "cyclomatic_complexity"]);
    let impact_ids: BTreeSet<String> =
        string_ids(migration_impacts.value(), &["items"], "id").into_iter().collect();

    let linked_servers = sorted_unique(
        get_array(db_dependency.value(), &["dependencies", "linked_servers"])
            .iter()
            .filter_map(|item| item.get("name"))
            .filter_map(|v| v.as_str())
            .map(str::to_string),
    );
    let cross_db = sorted_unique(
        get_array(db_dependency.value(), &["dependencies", "cross_database"])
            .iter()
            .filter_map(|item| {
                let database = item.get("database")?.as_str()?;
                let schema = item.get("schema")?.as_str()?;
                let object = item.get("object")?.as_str()?;
                Some(format!("{database}.{schema}.{object}"))
            }),
    );

    let perf_risk_level = get_str(perf_risk.value(), &["summary", "risk_level"])
        .unwrap_or_else(|| "unknown".to_string());
    let difficulty_level = get_str(difficulty.value(), &["summary", "difficulty_level"])
        .or_else(|| get_str(mapping_strategy.value(), &["summary", "difficulty"]))
        .unwrap_or_else(|| "unknown".to_string());

    let mut tags = build_tags(
        has_writes,
        uses_transaction,
        &impact_ids,
        cyclomatic_complexity,
        !linked_servers.is_empty(),
        !cross_db.is_empty(),
        &perf_risk_level,
        &difficulty_level,
    );
    tags = sorted_unique(tags);
    let tags = cap_list(tags, max_items, &mut errors, "tags");

    let mut templates: Vec<SpecTemplate> =
        get_array(business_rules.value(), &["template_suggestions"])
            .iter()
            .filter_map(|item| {
                Some(SpecTemplate {
                    id: item.get("template_id")?.as_str()?.to_string(),
                    source: "business_rules".to_string(),
                    confidence: item.get("confidence")?.as_f64()?,
                })
            })
            .collect();
    templates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    let templates = cap_list(templates, max_items, &mut errors, "templates");

    let mut rules: Vec<(f64, SpecRule)> = get_array(business_rules.value(), &["rules"])
        .iter()
        .filter_map(|item| {
            let rule = SpecRule {
                id: item.get("id")?.as_str()?.to_string(),
                kind: item.get("kind")?.as_str()?.to_string(),
                condition: item.get("condition")?.as_str()?.to_string(),
                action: item.get("action")?.as_str()?.to_string(),
            };
            let confidence = item.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
            Some((confidence, rule))
        })
        .collect();
    rules.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.id.cmp(&b.1.id))
    });
    let rules = cap_list(
        rules.into_iter().map(|(_, rule)| rule).collect(),
        max_items,
        &mut errors,
        "rules",
    );

    let tables = sorted_unique(
        get_array(references.as_ref(), &["tables"])
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string),
    );
    let functions = sorted_unique(
        get_array(references.as_ref(), &["functions"])
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string),
    );
    let tables = cap_list(tables, max_items, &mut errors, "dependencies.tables");
    let functions = cap_list(functions, max_items, &mut errors, "dependencies.functions");
    let cross_db = cap_list(cross_db, max_items, &mut errors, "dependencies.cross_db");
    let linked_servers =
        cap_list(linked_servers, max_items, &mut errors, "dependencies.linked_servers");

    let transactions_spec = transaction_spec(transactions.value(), tx_boundary.value());
    let approach = get_str(mapping_strategy.value(), &["summary", "approach"])
        .unwrap_or_else(|| "unknown".to_string());
    let mybatis_spec = SpecMybatis {
        approach: approach.clone(),
        difficulty_score: get_opt_i64(difficulty.value(), &["summary", "difficulty_score"]),
    };

    let migration_impact_risks = cap_list(
        sorted_unique(string_ids(migration_impacts.value(), &["items"], "id")),
        max_items,
        &mut errors,
        "risks.migration_impacts",
    );
    let performance_risks = cap_list(
        sorted_unique(string_ids(perf_risk.value(), &["findings"], "id")),
        max_items,
        &mut errors,
        "risks.performance",
    );
    let db_dependency_risks = cap_list(
        sorted_unique(string_ids(db_dependency.value(), &["reasons"], "id")),
        max_items,
        &mut errors,
        "risks.db_dependency",
    );

    let mut recommendations: Vec<Recommendation> = Vec::new();
    for source in [
        mapping_strategy.value(),
        difficulty.value(),
        perf_risk.value(),
        db_dependency.value(),
    ] {
        for item in get_array(source, &["recommendations"]) {
            if let (Some(id), Some(message)) = (
                item.get("id").and_then(Value::as_str),
                item.get("message").and_then(Value::as_str),
            ) && !recommendations.iter().any(|existing| existing.id == id)
            {
                recommendations.push(Recommendation {
                    id: id.to_string(),
                    message: message.to_string(),
                });
            }
        }
    }
    recommendations.sort_by(|a, b| a.id.cmp(&b.id));
    let recommendations = cap_list(recommendations, max_items, &mut errors, "recommendations");

    let summary = SpecSummary {
        one_liner: one_liner(
            object_type,
            has_writes,
            cyclomatic_complexity,
            &approach,
            &perf_risk_level,
            &difficulty_level,
        ),
        risk_level: perf_risk_level,
        difficulty_level,
    };

    let evidence = SpecEvidenceBlock {
        signals: SpecEvidenceSignals {
            table_count: tables.len(),
            cyclomatic_complexity,
            has_writes,
            uses_transaction,
            has_try_catch: get_bool(error_handling.value(), &["has_try_catch"]),
        },
    };

    SpecReport {
        version: VERSION.to_string(),
        object: SpecObject {
            name: name.to_string(),
            object_type: object_type.to_string(),
            normalized: normalize_name(name),
        },
        spec: SpecBody {
            tags,
            summary,
            templates,
            rules,
            dependencies: SpecDependencies { tables, functions, cross_db, linked_servers },
            transactions: transactions_spec,
            mybatis: mybatis_spec,
            risks: SpecRisks {
                migration_impacts: migration_impact_risks,
                performance: performance_risks,
                db_dependency: db_dependency_risks,
            },
            recommendations,
            evidence,
        },
        errors: sorted_unique(errors),
    }
}

pub fn build_spec_with_evidence(
    name: &str,
    object_type: &str,
    sql: Option<&str>,
    inputs: Option<&SpecInputs>,
    options: &SpecOptions,
    evidence_options: &EvidenceOptions,
    cache: &RetrieverCache,
) -> SpecWithEvidenceReport {
    let report = build_standardization_spec(name, object_type, sql, inputs, options);
    let mut errors = report.errors.clone();

    let spec_value = to_value(&report.spec);
    let mut documents: Vec<EvidenceDocument> = Vec::new();
    let mut hits = Vec::new();

    match evidence_options.docs_dir.as_deref() {
        None => {
            errors.push("DOCS_DIR_NOT_FOUND: docs_dir not configured".to_string());
        }
        Some(docs_dir) if !Path::new(docs_dir).is_dir() => {
            errors.push(format!("DOCS_DIR_NOT_FOUND: {docs_dir}"));
        }
        Some(docs_dir) => {
            let index = cache.index_for(Path::new(docs_dir), options.case_insensitive);
            if index.is_empty() {
                errors.push("DOCS_EMPTY".to_string());
            } else {
                let query_terms = extract_query_terms(&spec_value);
                if query_terms.is_empty() {
                    errors.push("QUERY_TERMS_EMPTY".to_string());
                } else {
                    hits = index.search(&query_terms.join(" "), evidence_options.top_k);
                }
            }
        }
    }

    for hit in &hits {
        let (snippet, truncated) = build_snippet(&hit.text, evidence_options.max_snippet_chars);
        if truncated {
            errors.push(format!("SNIPPET_TRUNCATED: {}", hit.doc_id));
        }
        documents.push(EvidenceDocument {
            doc_id: hit.doc_id.clone(),
            title: hit.title.clone(),
            source: hit.source.clone(),
            score: hit.score,
            snippet,
            truncated,
        });
    }

    let pattern_recommendations = build_pattern_recommendations(&spec_value, &hits);

    SpecWithEvidenceReport {
        version: VERSION_WITH_EVIDENCE.to_string(),
        object: report.object,
        spec: report.spec,
        evidence: Evidence { documents, pattern_recommendations },
        errors: sorted_unique(errors),
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn normalize_sections(sections: Option<&[String]>) -> Vec<String> {
    match sections {
        None => ALL_SECTIONS.iter().map(|s| s.to_string()).collect(),
        Some(sections) if sections.is_empty() => {
            ALL_SECTIONS.iter().map(|s| s.to_string()).collect()
        }
        Some(sections) => sorted_unique(
            sections
                .iter()
                .map(|section| section.trim().to_ascii_lowercase())
                .filter(|section| !section.is_empty()),
        ),
    }
}

fn resolve(
    section: &str,
    include_sections: &[String],
    errors: &mut Vec<String>,
    input_value: Option<Value>,
    computed_value: Option<Value>,
) -> Section {
    if let Some(value) = input_value {
        return Section::Given(value);
    }
    if let Some(value) = computed_value {
        return Section::Computed(value);
    }
    if include_sections.iter().any(|included| included == section) {
        errors.push(format!("SECTION_NOT_AVAILABLE: {section}"));
    }
    Section::Missing
}

fn unwrap_section(section: Section, key: &str) -> Option<Value> {
    let value = section.value()?.clone();
    match value.get(key) {
        Some(inner) if inner.is_object() => Some(inner.clone()),
        _ => Some(value),
    }
}

fn extend_errors(errors: &mut Vec<String>, payload: Option<&Value>) {
    if let Some(list) = payload
        .and_then(|value| value.get("errors"))
        .and_then(Value::as_array)
    {
        errors.extend(list.iter().filter_map(|v| v.as_str()).map(str::to_string));
    }
}

fn get<'v>(value: Option<&'v Value>, path: &[&str]) -> Option<&'v Value> {
    let mut current = value?;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn get_bool(value: Option<&Value>, path: &[&str]) -> bool {
    get(value, path).and_then(Value::as_bool).unwrap_or(false)
}

fn get_i64(value: Option<&Value>, path: &[&str]) -> i64 {
    get(value, path).and_then(Value::as_i64).unwrap_or(0)
}

fn get_opt_i64(value: Option<&Value>, path: &[&str]) -> Option<i64> {
    get(value, path).and_then(Value::as_i64)
}

fn get_str(value: Option<&Value>, path: &[&str]) -> Option<String> {
    get(value, path)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn get_array<'v>(value: Option<&'v Value>, path: &[&str]) -> Vec<&'v Value> {
    get(value, path)
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn string_ids(value: Option<&Value>, path: &[&str], key: &str) -> Vec<String> {
    get_array(value, path)
        .iter()
        .filter_map(|item| item.get(key))
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_tags(
    has_writes: bool,
    uses_transaction: bool,
    impact_ids: &BTreeSet<String>,
    cyclomatic_complexity: i64,
    has_linked_servers: bool,
    has_cross_db: bool,
    perf_risk_level: &str,
    difficulty_level: &str,
) -> Vec<String> {
    let mut tags = Vec::new();
    tags.push(if has_writes { "has_writes" } else { "read_only" }.to_string());
    tags.push(if uses_transaction { "uses_transaction" } else { "no_txn" }.to_string());

    if impact_ids.contains("IMP_DYN_SQL") {
        tags.push("dynamic_sql".to_string());
    }
    if impact_ids.contains("IMP_CURSOR") {
        tags.push("cursor".to_string());
    }
    if impact_ids.contains("IMP_TEMP_TABLE") || impact_ids.contains("IMP_TABLE_VARIABLE") {
        tags.push("temp_objects".to_string());
    }
    if impact_ids.contains("IMP_MERGE") {
        tags.push("merge".to_string());
    }

    if cyclomatic_complexity <= 5 {
        tags.push("low_complexity".to_string());
    } else if cyclomatic_complexity >= 12 {
        tags.push("high_complexity".to_string());
    }

    if has_linked_servers {
        tags.push("linked_server".to_string());
    }
    if has_cross_db {
        tags.push("cross_db".to_string());
    }

    if matches!(perf_risk_level, "high" | "critical") {
        tags.push("perf_risk_high".to_string());
    }
    if matches!(difficulty_level, "high" | "very_high") {
        tags.push("difficulty_high".to_string());
    }

    tags
}

fn transaction_spec(
    transactions: Option<&Value>,
    tx_boundary: Option<&Value>,
) -> SpecTransactions {
    if let Some(tx_boundary) = tx_boundary {
        return SpecTransactions {
            recommended_boundary: get_str(Some(tx_boundary), &["summary", "recommended_boundary"]),
            propagation: get_str(Some(tx_boundary), &["summary", "propagation"]),
            isolation_level: get_str(Some(tx_boundary), &["summary", "isolation_level"]),
        };
    }
    if let Some(transactions) = transactions {
        let uses_transaction = get_bool(Some(transactions), &["uses_transaction"]);
        return SpecTransactions {
            recommended_boundary: Some(if uses_transaction { "service" } else { "none" }.to_string()),
            propagation: Some(if uses_transaction { "REQUIRED" } else { "SUPPORTS" }.to_string()),
            isolation_level: get_str(Some(transactions), &["isolation_level"]),
        };
    }
    SpecTransactions { recommended_boundary: None, propagation: None, isolation_level: None }
}

fn one_liner(
    object_type: &str,
    has_writes: bool,
    cyclomatic_complexity: i64,
    approach: &str,
    risk_level: &str,
    difficulty_level: &str,
) -> String {
    let read_phrase = if has_writes { "Write-enabled" } else { "Read-only" };
    let complexity_phrase = if cyclomatic_complexity >= 12 {
        "high complexity"
    } else if cyclomatic_complexity <= 5 {
        "low complexity"
    } else {
        "moderate complexity"
    };
    let approach_phrase = match approach {
        APPROACH_REWRITE => "safe for MyBatis rewrite",
        APPROACH_CALL_SP_FIRST => "best suited for call-first migration",
        _ => "migration approach undetermined",
    };
    format!(
        "{read_phrase} {} with {complexity_phrase}; {approach_phrase}; risk {risk_level}, difficulty {difficulty_level}.",
        object_type.to_ascii_lowercase()
    )
}

fn normalize_name(name: &str) -> String {
    name.replace(['[', ']'], "").trim().to_ascii_lowercase()
}

fn cap_list<T>(items: Vec<T>, max_items: usize, errors: &mut Vec<String>, section: &str) -> Vec<T> {
    if max_items == 0 || items.len() <= max_items {
        return items;
    }
    errors.push(format!("SECTION_TRUNCATED: {section}"));
    let mut items = items;
    items.truncate(max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SpecOptions {
        SpecOptions::default()
    }

    #[test]
    fn test_spec_from_sql_read_only() {
        let report = build_standardization_spec(
            "dbo.usp_Get",
            "procedure",
            Some("SELECT id FROM dbo.Users WHERE id = 1"),
            None,
            &options(),
        );
        assert_eq!(report.version, "5.1.0");
        assert_eq!(report.object.normalized, "dbo.usp_get");
        assert!(report.spec.tags.contains(&"read_only".to_string()));
        assert!(report.spec.tags.contains(&"no_txn".to_string()));
        assert!(report.spec.tags.contains(&"low_complexity".to_string()));
        assert_eq!(report.spec.transactions.recommended_boundary.as_deref(), Some("none"));
        assert_eq!(report.spec.mybatis.approach, "rewrite_to_mybatis_sql");
        assert!(report.spec.dependencies.tables.contains(&"DBO.USERS".to_string()));
    }

    #[test]
    fn test_spec_tags_for_risky_procedure() {
        let sql = "
            BEGIN TRAN;
            DECLARE c CURSOR FOR SELECT 1;
            EXEC(@dyn);
            INSERT INTO dbo.T (id) VALUES (1);
            COMMIT TRAN;
        ";
        let report =
            build_standardization_spec("dbo.usp_Risky", "procedure", Some(sql), None, &options());
        for tag in ["has_writes", "uses_transaction", "dynamic_sql", "cursor"] {
            assert!(report.spec.tags.contains(&tag.to_string()), "missing {tag}");
        }
        // Tags are sorted.
        let mut sorted = report.spec.tags.clone();
        sorted.sort();
        assert_eq!(report.spec.tags, sorted);
    }

    #[test]
    fn test_one_liner_never_contains_identifiers() {
        let report = build_standardization_spec(
            "dbo.usp_SecretName",
            "procedure",
            Some("SELECT secret_column FROM dbo.SecretTable"),
            None,
            &options(),
        );
        let one_liner = &report.spec.summary.one_liner;
        assert!(!one_liner.contains("Secret"));
        assert!(!one_liner.contains("secret_column"));
        assert!(one_liner.starts_with("Read-only procedure"));
    }

    #[test]
    fn test_missing_sql_and_inputs_reports_sections() {
        let report =
            build_standardization_spec("dbo.usp_X", "procedure", None, None, &options());
        assert!(
            report
                .errors
                .iter()
                .any(|e| e == "SECTION_NOT_AVAILABLE: references")
        );
        assert!(
            report
                .errors
                .iter()
                .any(|e| e == "SECTION_NOT_AVAILABLE: db_dependency")
        );
        assert_eq!(report.spec.summary.risk_level, "unknown");
    }

    #[test]
    fn test_given_inputs_win_over_missing_sql() {
        let inputs = SpecInputs {
            analyze: Some(serde_json::json!({
                "data_changes": {"data_changes": {"has_writes": true}},
                "transactions": {"uses_transaction": true, "isolation_level": null},
            })),
            ..SpecInputs::default()
        };
        let report =
            build_standardization_spec("dbo.usp_X", "procedure", None, Some(&inputs), &options());
        assert!(report.spec.tags.contains(&"has_writes".to_string()));
        assert!(report.spec.tags.contains(&"uses_transaction".to_string()));
        // Sections with neither input nor SQL still surface as unavailable.
        assert!(
            report
                .errors
                .iter()
                .any(|e| e == "SECTION_NOT_AVAILABLE: perf_risk")
        );
    }

    #[test]
    fn test_section_caps_emit_truncation_errors() {
        let mut options = options();
        options.max_items_per_section = 1;
        let sql = "SELECT a FROM dbo.A JOIN dbo.B ON 1=1 JOIN dbo.C ON 1=1";
        let report =
            build_standardization_spec("dbo.usp_X", "procedure", Some(sql), None, &options);
        assert_eq!(report.spec.dependencies.tables.len(), 1);
        assert!(
            report
                .errors
                .iter()
                .any(|e| e == "SECTION_TRUNCATED: dependencies.tables")
        );
    }

    #[test]
    fn test_deterministic_assembly() {
        let sql = "BEGIN TRAN; UPDATE dbo.T SET x = 1 WHERE id = 2; COMMIT TRAN;";
        let first = build_standardization_spec("dbo.usp_X", "procedure", Some(sql), None, &options());
        let second =
            build_standardization_spec("dbo.usp_X", "procedure", Some(sql), None, &options());
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_errors_sorted_unique() {
        let report =
            build_standardization_spec("dbo.usp_X", "procedure", None, None, &options());
        let mut sorted = report.errors.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(report.errors, sorted);
    }
}
