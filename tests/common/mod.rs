// Shared test helpers

use gamewarden::registry_repo::RegistryRepo;
use std::sync::Arc;

/// Fresh registry in a temp directory. The TempDir must be kept alive for the
/// duration of the test.
pub async fn temp_registry() -> (tempfile::TempDir, Arc<RegistryRepo>) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let db_path = dir.path().join("registry.db");
    let registry = RegistryRepo::connect(db_path.to_str().expect("utf8 path"))
        .await
        .expect("connect");
    registry.init().await.expect("init");
    (dir, Arc::new(registry))
}
