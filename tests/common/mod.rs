use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

static DIRECTORY_ID: AtomicUsize = AtomicUsize::new(1);

/// A fresh scratch directory per test, removed on drop.
#[allow(dead_code)]
pub struct TestSetup {
    pub base_dir: PathBuf,
}

#[allow(dead_code)]
impl TestSetup {
    pub async fn init() -> TestSetup {
        let directory_id = DIRECTORY_ID.fetch_add(1, SeqCst);
        let base_dir = PathBuf::from(format!("test_local_data_{directory_id}"));
        tokio::fs::create_dir(&base_dir).await.unwrap();
        TestSetup { base_dir }
    }
}

impl Drop for TestSetup {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.base_dir);
    }
}
