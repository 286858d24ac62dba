use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Trim};
use reqwest::Client;
use tracing::debug;

use crate::domain::product::Product;
use crate::errors::FetchError;
use crate::text::normalize;

const NAME_COLUMNS: &[&str] = &["nombre", "name", "producto", "product"];
const DESCRIPTION_COLUMNS: &[&str] = &["descripcion", "description", "detalle"];
const CATEGORY_COLUMNS: &[&str] = &["categoria", "category"];
const PRICE_COLUMNS: &[&str] = &["precio", "price", "valor"];
const URL_COLUMNS: &[&str] = &["url_tienda", "url", "enlace", "link"];

/// Source of tabular catalog rows.
#[async_trait]
pub trait CatalogFeed: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;
    async fn fetch(&self) -> Result<Vec<Product>, FetchError>;
}

/// Downloads a CSV export over HTTP (e.g. a published spreadsheet).
pub struct HttpCatalogFeed {
    client: Client,
    url: String,
    delimiter: u8,
}

impl HttpCatalogFeed {
    pub fn new(url: impl Into<String>, delimiter: u8, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client, url: url.into(), delimiter }
    }
}

#[async_trait]
impl CatalogFeed for HttpCatalogFeed {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<Product>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|error| FetchError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body =
            response.text().await.map_err(|error| FetchError::Transport(error.to_string()))?;
        debug!(
            event_name = "catalog.feed.downloaded",
            source = %self.url,
            bytes = body.len(),
            "catalog feed downloaded"
        );
        parse_csv(&body, self.delimiter)
    }
}

/// Reads a CSV file from disk, used for local backups of the catalog.
pub struct FileCatalogFeed {
    path: PathBuf,
    delimiter: u8,
}

impl FileCatalogFeed {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self { path: path.into(), delimiter }
    }
}

#[async_trait]
impl CatalogFeed for FileCatalogFeed {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<Product>, FetchError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|error| FetchError::Io(format!("{}: {error}", self.path.display())))?;
        parse_csv(&raw, self.delimiter)
    }
}

/// Fixed product list; useful for tests and for running without a feed.
#[derive(Clone, Default)]
pub struct StaticCatalogFeed {
    result: Option<Result<Vec<Product>, FetchError>>,
}

impl StaticCatalogFeed {
    pub fn new(products: Vec<Product>) -> Self {
        Self { result: Some(Ok(products)) }
    }

    pub fn failing(error: FetchError) -> Self {
        Self { result: Some(Err(error)) }
    }
}

#[async_trait]
impl CatalogFeed for StaticCatalogFeed {
    fn describe(&self) -> String {
        "static".to_owned()
    }

    async fn fetch(&self) -> Result<Vec<Product>, FetchError> {
        self.result.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Picks the feed implementation for a configured `catalog.source`.
pub fn feed_for_source(source: &str, delimiter: u8, timeout: Duration) -> Box<dyn CatalogFeed> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Box::new(HttpCatalogFeed::new(source, delimiter, timeout))
    } else {
        Box::new(FileCatalogFeed::new(source, delimiter))
    }
}

/// Parses a headered CSV document into products.
///
/// Columns are located by header name (Spanish or English aliases), so extra
/// columns and any ordering are accepted. Rows without a name are skipped.
pub fn parse_csv(raw: &str, delimiter: u8) -> Result<Vec<Product>, FetchError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(raw.trim_start_matches('\u{feff}').as_bytes());

    let headers = reader.headers().map_err(|error| FetchError::Parse(error.to_string()))?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut products = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| FetchError::Parse(error.to_string()))?;
        if let Some(product) = columns.product(&record) {
            products.push(product);
        }
    }

    Ok(products)
}

struct ColumnMap {
    name: usize,
    description: Option<usize>,
    category: Option<usize>,
    price: Option<usize>,
    url: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, FetchError> {
        let normalized = headers.iter().map(normalize).collect::<Vec<_>>();
        let find = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| normalized.iter().position(|header| header == alias))
        };

        let name = find(NAME_COLUMNS).ok_or_else(|| {
            FetchError::Parse(format!(
                "no product name column found (expected one of {})",
                NAME_COLUMNS.join("|")
            ))
        })?;

        Ok(Self {
            name,
            description: find(DESCRIPTION_COLUMNS),
            category: find(CATEGORY_COLUMNS),
            price: find(PRICE_COLUMNS),
            url: find(URL_COLUMNS),
        })
    }

    fn product(&self, record: &StringRecord) -> Option<Product> {
        let cell = |index: Option<usize>| {
            index.and_then(|index| record.get(index)).map(str::trim).unwrap_or_default()
        };
        let optional = |index: Option<usize>| {
            let value = cell(index);
            (!value.is_empty()).then(|| value.to_owned())
        };

        let name = cell(Some(self.name));
        if name.is_empty() {
            return None;
        }

        Some(Product {
            name: name.to_owned(),
            description: cell(self.description).to_owned(),
            category: optional(self.category),
            price: optional(self.price),
            url: cell(self.url).to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{feed_for_source, parse_csv, CatalogFeed, FileCatalogFeed};
    use crate::errors::FetchError;

    #[test]
    fn parses_spanish_headers_in_any_order_with_extra_columns() {
        let raw = "sku,url_tienda,Descripción,nombre,precio,categoría\n\
                   R-1,https://tienda.example/r,Media cara,Respirador AIR S950,$120.000,Seguridad\n\
                   M-2,https://tienda.example/m,Mango de fibra,Martillo,,Herramientas\n";

        let products = parse_csv(raw, b',').expect("csv should parse");

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Respirador AIR S950");
        assert_eq!(products[0].description, "Media cara");
        assert_eq!(products[0].price.as_deref(), Some("$120.000"));
        assert_eq!(products[0].category.as_deref(), Some("Seguridad"));
        assert_eq!(products[0].url, "https://tienda.example/r");
        assert_eq!(products[1].price, None);
    }

    #[test]
    fn rows_without_name_are_dropped() {
        let raw = "nombre;descripcion;url\n;sin nombre;https://x\nLija;Grano 120;https://y\n";

        let products = parse_csv(raw, b';').expect("csv should parse");

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Lija");
    }

    #[test]
    fn missing_name_column_is_a_parse_error() {
        let error = parse_csv("title,url\nfoo,https://x\n", b',').expect_err("must fail");
        assert!(matches!(error, FetchError::Parse(message) if message.contains("nombre")));
    }

    #[tokio::test]
    async fn file_feed_reads_local_backup() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("products.csv");
        std::fs::write(&path, "name,description,url\nBroca,Para concreto,https://z\n")
            .expect("write csv");

        let feed = FileCatalogFeed::new(&path, b',');
        let products = feed.fetch().await.expect("fetch");

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Broca");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let feed = feed_for_source("/definitely/not/here.csv", b',', Duration::from_secs(1));
        let error = feed.fetch().await.expect_err("must fail");
        assert_eq!(error.kind(), "io");
    }
}
