//! Lexical retrieval: TF-IDF over a local docs directory.
//!
//! Pure local computation. Documents are chunked deterministically, ranked
//! by cosine similarity, and emitted as bounded snippets with stable ids.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::utils::re;

static TOKEN: Lazy<Regex> = Lazy::new(|| re(r"\w+"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt"];
const MAX_QUERY_TERMS: usize = 30;

#[derive(Debug, Clone)]
pub struct DocChunk {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub text: String,
    pub chunk_id: usize,
}

#[derive(Debug, Default)]
pub struct TfIdfIndex {
    chunks: Vec<DocChunk>,
    vectors: Vec<HashMap<String, f64>>,
    norms: Vec<f64>,
    idf: HashMap<String, f64>,
    case_insensitive: bool,
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub score: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PatternRecommendation {
    pub id: String,
    pub message: String,
    pub source_doc_id: Option<String>,
}

/// Per-directory index cache. Readers observe the old or new index
/// atomically; rebuilds for the same directory are serialized by the map
/// entry lock.
#[derive(Debug, Default)]
pub struct RetrieverCache {
    indexes: DashMap<PathBuf, Arc<TfIdfIndex>>,
}

impl RetrieverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_for(&self, docs_dir: &Path, case_insensitive: bool) -> Arc<TfIdfIndex> {
        self.indexes
            .entry(docs_dir.to_path_buf())
            .or_insert_with(|| {
                Arc::new(build_index(load_documents(docs_dir), case_insensitive))
            })
            .clone()
    }
}

/// Walk `docs_dir` for `*.md` / `*.txt`, sorted by path; chunk markdown by
/// headings + blank lines and plain text by blank lines. Ids are a pure
/// function of file order and chunk order.
pub fn load_documents(docs_dir: &Path) -> Vec<DocChunk> {
    if !docs_dir.is_dir() {
        return Vec::new();
    }

    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    collect_files(docs_dir, &mut files);

    let mut chunks = Vec::new();
    for (file_index, path) in files.iter().enumerate() {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let title = extract_title(path, &text, &extension);
        for (chunk_index, chunk_text) in chunk_text(&extension, &text).into_iter().enumerate() {
            let cleaned = chunk_text.trim().to_string();
            if cleaned.is_empty() {
                continue;
            }
            chunks.push(DocChunk {
                doc_id: format!("doc_{:04}#chunk_{:04}", file_index + 1, chunk_index + 1),
                title: title.clone(),
                source: path.display().to_string(),
                text: cleaned,
                chunk_id: chunk_index + 1,
            });
        }
    }
    chunks
}

fn collect_files(dir: &Path, files: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files);
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            files.insert(path);
        }
    }
}

pub fn build_index(chunks: Vec<DocChunk>, case_insensitive: bool) -> TfIdfIndex {
    if chunks.is_empty() {
        return TfIdfIndex { case_insensitive, ..TfIdfIndex::default() };
    }

    let tokenized: Vec<Vec<String>> = chunks
        .iter()
        .map(|chunk| tokenize(&chunk.text, case_insensitive))
        .collect();

    let mut df: HashMap<String, usize> = HashMap::new();
    for tokens in &tokenized {
        for term in tokens.iter().collect::<BTreeSet<_>>() {
            *df.entry(term.clone()).or_default() += 1;
        }
    }

    let total_docs = chunks.len() as f64;
    let idf: HashMap<String, f64> = df
        .into_iter()
        .map(|(term, count)| (term, ((total_docs + 1.0) / (count as f64 + 1.0)).ln() + 1.0))
        .collect();

    let mut vectors = Vec::with_capacity(chunks.len());
    let mut norms = Vec::with_capacity(chunks.len());
    for tokens in &tokenized {
        let mut tf: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *tf.entry(token.clone()).or_default() += 1;
        }
        let weights: HashMap<String, f64> = tf
            .into_iter()
            .map(|(term, freq)| {
                let weight = (1.0 + (freq as f64).ln()) * idf.get(&term).copied().unwrap_or(0.0);
                (term, weight)
            })
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        vectors.push(weights);
        norms.push(norm);
    }

    TfIdfIndex { chunks, vectors, norms, idf, case_insensitive }
}

impl TfIdfIndex {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<Hit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query, self.case_insensitive);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut tf: HashMap<String, usize> = HashMap::new();
        for token in query_tokens {
            *tf.entry(token).or_default() += 1;
        }
        let query_weights: HashMap<String, f64> = tf
            .into_iter()
            .map(|(term, freq)| {
                let weight = (1.0 + (freq as f64).ln()) * self.idf.get(&term).copied().unwrap_or(0.0);
                (term, weight)
            })
            .collect();
        let query_norm = query_weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut hits: Vec<Hit> = Vec::new();
        for ((chunk, vector), norm) in self
            .chunks
            .iter()
            .zip(self.vectors.iter())
            .zip(self.norms.iter())
        {
            if *norm == 0.0 {
                continue;
            }
            let dot: f64 = query_weights
                .iter()
                .map(|(term, weight)| weight * vector.get(term).copied().unwrap_or(0.0))
                .sum();
            if dot <= 0.0 {
                continue;
            }
            hits.push(Hit {
                doc_id: chunk.doc_id.clone(),
                title: chunk.title.clone(),
                source: chunk.source.clone(),
                score: dot / (query_norm * norm),
                text: chunk.text.clone(),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(top_k);
        hits
    }
}

/// Collapse whitespace and truncate at `max_chars`, reporting whether the
/// snippet was cut.
pub fn build_snippet(text: &str, max_chars: usize) -> (String, bool) {
    let cleaned = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    if max_chars == 0 || cleaned.chars().count() <= max_chars {
        return (cleaned, false);
    }
    let truncated: String = cleaned.chars().take(max_chars).collect();
    (truncated.trim_end().to_string(), true)
}

/// Query terms derived from a spec report: tags, template ids, and risk ids,
/// lowercased, deduplicated, sorted, capped.
pub fn extract_query_terms(spec: &Value) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    if let Some(tags) = spec.get("tags").and_then(Value::as_array) {
        terms.extend(tags.iter().filter_map(Value::as_str).map(str::to_string));
    }
    if let Some(templates) = spec.get("templates").and_then(Value::as_array) {
        terms.extend(
            templates
                .iter()
                .filter_map(|template| template.get("id"))
                .filter_map(Value::as_str)
                .map(str::to_string),
        );
    }
    if let Some(risks) = spec.get("risks").and_then(Value::as_object) {
        for key in ["migration_impacts", "performance", "db_dependency"] {
            if let Some(items) = risks.get(key).and_then(Value::as_array) {
                terms.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
    }

    let normalized: BTreeSet<String> = terms
        .into_iter()
        .map(|term| term.trim().to_ascii_lowercase())
        .filter(|term| !term.is_empty())
        .collect();
    normalized.into_iter().take(MAX_QUERY_TERMS).collect()
}

/// Fixed-rule recommendations keyed off spec tags/templates/risks, each with
/// an optional supporting document chosen by keyword overlap.
pub fn build_pattern_recommendations(spec: &Value, hits: &[Hit]) -> Vec<PatternRecommendation> {
    let tags: BTreeSet<String> = spec
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let template_ids: BTreeSet<String> = spec
        .get("templates")
        .and_then(Value::as_array)
        .map(|templates| {
            templates
                .iter()
                .filter_map(|template| template.get("id"))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let mut risk_ids: BTreeSet<String> = BTreeSet::new();
    if let Some(risks) = spec.get("risks").and_then(Value::as_object) {
        for key in ["migration_impacts", "performance", "db_dependency"] {
            if let Some(items) = risks.get(key).and_then(Value::as_array) {
                risk_ids.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
    }

    let template_matches = |keyword: &str| {
        template_ids.iter().any(|id| {
            let upper = id.to_ascii_uppercase();
            upper.starts_with("TPL_") && upper.contains(keyword)
        })
    };
    let risk_matches = |keyword: &str| {
        risk_ids
            .iter()
            .any(|id| id.to_ascii_uppercase().contains(keyword))
    };

    let mut recommendations = Vec::new();
    let mut add = |id: &str, message: &str, keywords: &[&str]| {
        recommendations.push(PatternRecommendation {
            id: id.to_string(),
            message: message.to_string(),
            source_doc_id: best_doc_for_keywords(hits, keywords),
        });
    };

    if tags.contains("dynamic_sql") || template_matches("DYNAMIC") {
        add(
            "PAT_MYBATIS_DYNAMIC_TAGS",
            "Prefer MyBatis <if>/<choose>/<foreach> over concatenated dynamic SQL.",
            &["dynamic", "sql", "mybatis", "if", "choose", "foreach"],
        );
    }
    if tags.contains("cursor") {
        add(
            "PAT_REPLACE_CURSOR_SET_BASED",
            "Replace cursors with set-based queries or batched operations.",
            &["cursor", "set", "based", "set-based"],
        );
    }
    if tags.contains("uses_transaction") {
        add(
            "PAT_SERVICE_LAYER_TX",
            "Move transaction boundaries to the service layer with @Transactional.",
            &["transaction", "service", "boundary", "transactional"],
        );
    }
    if tags.contains("linked_server") || tags.contains("cross_db") {
        add(
            "PAT_ISOLATE_EXTERNAL_INTEGRATION",
            "Isolate linked server or cross-database access behind integration adapters.",
            &["linked", "server", "cross", "database", "integration", "external"],
        );
    }
    if risk_matches("SELECT_STAR") {
        add(
            "PAT_AVOID_SELECT_STAR",
            "Avoid SELECT * by listing explicit columns.",
            &["select", "columns", "explicit"],
        );
    }

    recommendations.sort_by(|a, b| a.id.cmp(&b.id));
    recommendations
}

fn best_doc_for_keywords(hits: &[Hit], keywords: &[&str]) -> Option<String> {
    let mut best_score = 0usize;
    let mut best_doc_id: Option<String> = None;
    for hit in hits {
        let content = format!("{} {}", hit.title, hit.text).to_ascii_lowercase();
        let score = keywords
            .iter()
            .filter(|keyword| content.contains(&keyword.to_ascii_lowercase()))
            .count();
        if score < 2 {
            continue;
        }
        let better = score > best_score
            || (score == best_score
                && best_doc_id
                    .as_deref()
                    .is_some_and(|current| hit.doc_id.as_str() < current));
        if better {
            best_score = score;
            best_doc_id = Some(hit.doc_id.clone());
        }
    }
    best_doc_id
}

fn tokenize(text: &str, case_insensitive: bool) -> Vec<String> {
    let text = if case_insensitive { text.to_ascii_lowercase() } else { text.to_string() };
    TOKEN
        .find_iter(&text)
        .map(|token| token.as_str().to_string())
        .collect()
}

fn extract_title(path: &Path, text: &str, extension: &str) -> String {
    if extension == "md" {
        for line in text.lines() {
            let stripped = line.trim();
            if let Some(heading) = stripped.strip_prefix('#') {
                let title = heading.trim_start_matches('#').trim();
                if !title.is_empty() {
                    return title.to_string();
                }
            }
        }
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

fn chunk_text(extension: &str, text: &str) -> Vec<String> {
    if extension == "md" { chunk_markdown(text) } else { chunk_plaintext(text) }
}

fn chunk_markdown(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.starts_with('#') {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current = Vec::new();
            }
            current.push(line);
            continue;
        }
        if stripped.is_empty() {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current = Vec::new();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

fn chunk_plaintext(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current = Vec::new();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_id: &str, title: &str, text: &str) -> DocChunk {
        DocChunk {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            source: format!("{title}.md"),
            text: text.to_string(),
            chunk_id: 1,
        }
    }

    #[test]
    fn test_chunk_markdown_by_headings_and_blank_lines() {
        let text = "# Title\nIntro line\n\nSecond paragraph\n## Sub\nDetail";
        let chunks = chunk_markdown(text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("# Title"));
        assert_eq!(chunks[1], "Second paragraph");
        assert!(chunks[2].starts_with("## Sub"));
    }

    #[test]
    fn test_chunk_plaintext_by_blank_lines() {
        let chunks = chunk_plaintext("a\nb\n\nc\n\n\n");
        assert_eq!(chunks, vec!["a\nb", "c"]);
    }

    #[test]
    fn test_search_ranks_matching_chunk_first() {
        let index = build_index(
            vec![
                chunk("doc_0001#chunk_0001", "Dynamic SQL", "Use mybatis dynamic sql tags if choose foreach"),
                chunk("doc_0002#chunk_0001", "Transactions", "Service layer transaction boundaries"),
            ],
            true,
        );
        let hits = index.search("dynamic sql mybatis", 5);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].doc_id, "doc_0001#chunk_0001");
    }

    #[test]
    fn test_search_empty_query_returns_nothing() {
        let index = build_index(vec![chunk("doc_0001#chunk_0001", "T", "content")], true);
        assert!(index.search("   ", 5).is_empty());
    }

    #[test]
    fn test_search_deterministic_ordering() {
        let index = build_index(
            vec![
                chunk("doc_0002#chunk_0001", "B", "same words here"),
                chunk("doc_0001#chunk_0001", "A", "same words here"),
            ],
            true,
        );
        let hits = index.search("same words", 5);
        assert_eq!(hits.len(), 2);
        // Equal scores tie-break on doc_id.
        assert_eq!(hits[0].doc_id, "doc_0001#chunk_0001");
    }

    #[test]
    fn test_build_snippet_truncates_and_flags() {
        let (snippet, truncated) = build_snippet("word ".repeat(100).as_str(), 20);
        assert!(truncated);
        assert!(snippet.chars().count() <= 20);
        assert!(!snippet.ends_with(' '));

        let (snippet, truncated) = build_snippet("short  text", 280);
        assert_eq!(snippet, "short text");
        assert!(!truncated);
    }

    #[test]
    fn test_extract_query_terms_sorted_unique() {
        let spec = serde_json::json!({
            "tags": ["dynamic_sql", "cursor", "dynamic_sql"],
            "templates": [{"id": "TPL_VALIDATE_RANGE"}],
            "risks": {
                "migration_impacts": ["IMP_DYN_SQL"],
                "performance": [],
                "db_dependency": []
            }
        });
        let terms = extract_query_terms(&spec);
        assert_eq!(terms, vec!["cursor", "dynamic_sql", "imp_dyn_sql", "tpl_validate_range"]);
    }

    #[test]
    fn test_pattern_recommendations_from_tags() {
        let spec = serde_json::json!({
            "tags": ["dynamic_sql", "uses_transaction"],
            "templates": [],
            "risks": {"migration_impacts": [], "performance": ["PRF_SELECT_STAR"], "db_dependency": []}
        });
        let hits = vec![Hit {
            doc_id: "doc_0001#chunk_0001".to_string(),
            title: "MyBatis Dynamic SQL".to_string(),
            source: "docs/dynamic.md".to_string(),
            score: 0.9,
            text: "Prefer dynamic sql with mybatis if choose foreach tags".to_string(),
        }];
        let recommendations = build_pattern_recommendations(&spec, &hits);
        let ids: Vec<_> = recommendations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "PAT_AVOID_SELECT_STAR",
                "PAT_MYBATIS_DYNAMIC_TAGS",
                "PAT_SERVICE_LAYER_TX",
            ]
        );
        let dynamic = recommendations
            .iter()
            .find(|r| r.id == "PAT_MYBATIS_DYNAMIC_TAGS")
            .unwrap();
        assert_eq!(dynamic.source_doc_id.as_deref(), Some("doc_0001#chunk_0001"));
    }

    #[test]
    fn test_missing_docs_dir_yields_no_chunks() {
        let chunks = load_documents(Path::new("/nonexistent/docs/dir"));
        assert!(chunks.is_empty());
    }
}
