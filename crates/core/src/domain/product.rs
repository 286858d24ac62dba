use serde::{Deserialize, Serialize};

/// One sellable item as published by the catalog feed.
///
/// Products carry no numeric id; `name` + `url` identify an entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub price: Option<String>,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    pub name: String,
    pub url: String,
}

impl Product {
    pub fn key(&self) -> ProductKey {
        ProductKey { name: self.name.clone(), url: self.url.clone() }
    }

    /// Text submitted to the embedding capability for this product.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.name, self.description).trim().to_owned()
    }
}

/// A product paired with its relevance for a single query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f32,
}
