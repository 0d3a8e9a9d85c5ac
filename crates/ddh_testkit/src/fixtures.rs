//! Test fixtures: taxonomy, records, clients and upload files.

use crate::server::FakeNodeServer;
use ddh_client::{Client, ClientConfig, RetryConfig, Session, HARVEST_ID_FIELD};
use ddh_codec::{FieldValue, Record, StaticTaxonomy, TaxonomyRegistry};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Host name used by test clients.
pub const TEST_HOST: &str = "ddh.test";

/// A small taxonomy covering the fields the fixtures use.
pub fn sample_taxonomy() -> StaticTaxonomy {
    StaticTaxonomy::new()
        .with_term("field_wbddh_data_type", "Time Series", 293)
        .with_term("field_wbddh_data_type", "Microdata", 294)
        .with_term("field_wbddh_data_type", "Geospatial", 295)
        .with_default("field_wbddh_data_type", 293)
        .with_term("field_wbddh_country", "Kenya", 101)
        .with_term("field_wbddh_country", "Ghana", 102)
        .with_term("field_wbddh_country", "Peru", 103)
        .with_term("field_topic", "Energy", 11)
        .with_term("field_topic", "Health", 12)
        .with_term("field_wbddh_resource_type", "Download", 981)
        .with_term("field_wbddh_resource_type", "Query Tool", 982)
        .with_term("field_license_wbddh", "CC-BY 4.0", 1341)
        .with_term("field_tags", "energy", 401)
        .with_term("field_tags", "access", 402)
        .with_alias("field_country", "field_wbddh_country")
}

/// Configuration pointing at [`TEST_HOST`] with zero retry delays.
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_HOST)
        .with_retry(RetryConfig::new(5).with_initial_delay(std::time::Duration::ZERO))
}

/// A session with fixed test credentials.
pub fn test_session() -> Session {
    Session::new("SESSabc", "cookie-value", "csrf-token")
}

/// A client over a fake server, using [`sample_taxonomy`].
pub fn test_client(server: FakeNodeServer) -> Client<FakeNodeServer> {
    test_client_with(test_config(), server)
}

/// A client over a fake server with a custom configuration.
pub fn test_client_with(config: ClientConfig, server: FakeNodeServer) -> Client<FakeNodeServer> {
    let taxonomy: Arc<dyn TaxonomyRegistry> = Arc::new(sample_taxonomy());
    Client::new(config, test_session(), server, taxonomy)
}

/// A dataset record with `resources` titled `Resource 0..count`.
///
/// Term fields carry the ids [`sample_taxonomy`] assigns, as the server
/// expects them.
pub fn sample_dataset(id: &str, resources: usize) -> Record {
    let resources: Vec<FieldValue> = (0..resources)
        .map(|i| FieldValue::Map(sample_resource(&format!("Resource {}", i))))
        .collect();

    Record::new()
        .with("title", format!("Dataset {}", id))
        .with("type", "dataset")
        .with(HARVEST_ID_FIELD, id)
        .with("field_wbddh_data_type", 293)
        .with("field_wbddh_country", vec![101, 102])
        .with("field_tags", vec![401, 402])
        .with("body", "A sample dataset.")
        .with("field_wbddh_release_date", "2019-03-01")
        .with("resources", FieldValue::List(resources))
}

/// A resource record with the given title.
pub fn sample_resource(title: &str) -> Record {
    Record::new()
        .with("title", title)
        .with("field_wbddh_resource_type", 981)
        .with("field_link_api", "https://example.org/data.csv")
}

/// Writes `content` to a named temporary file, for upload tests.
///
/// The file is removed when the returned handle drops.
pub fn upload_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content).expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

/// Returns a path as record text.
pub fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
