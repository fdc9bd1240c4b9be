//! BM25 keyword ranking over chunk texts.

use std::cmp::Reverse;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

/// Term frequency saturation.
const K1: f32 = 1.5;

/// Length normalization strength.
const B: f32 = 0.75;

/// A lexical match with a score normalized into `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: String,
    pub score: f32,
}

/// Lowercased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
struct Document {
    id: String,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// In-memory BM25 index.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    documents: Vec<Document>,
    doc_freqs: HashMap<String, u32>,
    avg_length: f32,
}

impl Bm25Index {
    /// Build an index from `(id, text)` pairs.
    pub fn build<'a, I>(docs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut documents = Vec::new();
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_length = 0usize;

        for (id, text) in docs {
            let tokens = tokenize(text);
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_default() += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            total_length += tokens.len();
            documents.push(Document {
                id: id.to_string(),
                term_freqs,
                length: tokens.len(),
            });
        }

        let avg_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f32 / documents.len() as f32
        };

        Self {
            documents,
            doc_freqs,
            avg_length,
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn raw_score(&self, doc: &Document, query_terms: &[String]) -> f32 {
        let length_ratio = if self.avg_length > 0.0 {
            doc.length as f32 / self.avg_length
        } else {
            0.0
        };

        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *doc.term_freqs.get(term)? as f32;
                let norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * length_ratio));
                Some(self.idf(term) * norm)
            })
            .sum()
    }

    /// Top `k` documents for `query`, scores divided by the best score.
    ///
    /// Documents sharing no term with the query are not returned. Ties are
    /// broken by id so results are deterministic.
    pub fn search(&self, query: &str, k: usize) -> Vec<LexicalHit> {
        let mut query_terms = tokenize(query);
        query_terms.sort();
        query_terms.dedup();
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &str)> = self
            .documents
            .iter()
            .map(|doc| (self.raw_score(doc, &query_terms), doc.id.as_str()))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by_key(|(score, id)| (Reverse(OrderedFloat(*score)), *id));
        scored.truncate(k);

        let max = scored.first().map(|(score, _)| *score).unwrap_or(0.0);
        scored
            .into_iter()
            .map(|(score, id)| LexicalHit {
                id: id.to_string(),
                score: score / max,
            })
            .collect()
    }
}
