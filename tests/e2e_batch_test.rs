// tests/e2e_batch_test.rs

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use webzip_dl::{
    DownloadJobContext,
    browser::{BrowserPage, BrowserSession},
    config::AppConfig,
    constants::service::SUBMIT_SELECTOR,
    error::AppResult,
    workflows,
};

/// 模拟打包服务：提交后按链接决定是否生成压缩包，以及浏览器保存时使用的文件名。
#[derive(Clone, Default)]
struct FakeSite {
    served_names: Arc<Mutex<HashMap<String, String>>>,
    download_dirs: Arc<Mutex<Vec<PathBuf>>>,
    pages_opened: Arc<Mutex<usize>>,
    pages_closed: Arc<Mutex<usize>>,
    session_closed: Arc<AtomicBool>,
}

impl FakeSite {
    fn serve(self, url: &str, file_name: &str) -> Self {
        self.served_names
            .lock()
            .unwrap()
            .insert(url.to_string(), file_name.to_string());
        self
    }
}

struct FakeSession {
    site: FakeSite,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&mut self) -> AppResult<Box<dyn BrowserPage>> {
        *self.site.pages_opened.lock().unwrap() += 1;
        Ok(Box::new(FakePage {
            site: self.site.clone(),
            typed: Mutex::new(String::new()),
            ready: AtomicBool::new(false),
        }))
    }

    async fn close(&mut self) -> AppResult<()> {
        self.site.session_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    site: FakeSite,
    typed: Mutex<String>,
    ready: AtomicBool,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn allow_downloads(&self, dir: &Path) -> AppResult<()> {
        self.site.download_dirs.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }

    async fn goto(&self, _url: &str, _idle_timeout: Duration) -> AppResult<()> {
        Ok(())
    }

    async fn type_into(&self, _selector: &str, text: &str) -> AppResult<()> {
        *self.typed.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        if selector != SUBMIT_SELECTOR {
            return Ok(());
        }
        let url = self.typed.lock().unwrap().clone();
        let served = self.site.served_names.lock().unwrap().get(&url).cloned();
        let Some(file_name) = served else {
            // 服务器一直没有生成压缩包
            return Ok(());
        };
        self.ready.store(true, Ordering::SeqCst);

        let dir = self.site.download_dirs.lock().unwrap().last().cloned().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let marker = dir.join(format!("{}.crdownload", file_name));
            std::fs::write(&marker, b"PK\x03\x04 partial archive").unwrap();
            tokio::time::sleep(Duration::from_millis(80)).await;
            std::fs::rename(&marker, dir.join(&file_name)).unwrap();
        });
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> AppResult<Value> {
        if script.contains("classList") {
            Ok(Value::Bool(self.ready.load(Ordering::SeqCst)))
        } else {
            Ok(json!(2))
        }
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        *self.site.pages_closed.lock().unwrap() += 1;
        Ok(())
    }
}

fn fast_context(site: &FakeSite) -> (TempDir, DownloadJobContext) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.output_dir = dunce::canonicalize(dir.path()).unwrap();
    config.ready_timeout = Duration::from_millis(400);
    config.watch.poll_interval = Duration::from_millis(10);
    config.watch.start_timeout = Duration::from_secs(2);
    config.watch.completion_timeout = Duration::from_secs(2);
    config.watch.settle_delay = Duration::from_millis(10);
    config.finalize.retry_delay = Duration::from_millis(10);

    let session = Box::new(FakeSession { site: site.clone() });
    let context = DownloadJobContext::new(Arc::new(config), session, CancellationToken::new());
    (dir, context)
}

fn zip_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_single_page_is_saved_under_its_own_name() {
    let url = "https://example.com/about.html";
    let site = FakeSite::default().serve(url, "about.zip");
    let (dir, context) = fast_context(&site);

    let stats = workflows::run_batch(&context, &[url.to_string()]).await.unwrap();

    assert_eq!((stats.total, stats.success, stats.failed), (1, 1, 0));
    let saved = dir.path().join("about.zip");
    assert!(std::fs::metadata(&saved).unwrap().len() > 0);
    assert_eq!(zip_files(dir.path()), vec!["about.zip"]);
    assert!(site.session_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_duplicate_root_urls_get_distinct_names() {
    let url = "https://example.com/";
    let site = FakeSite::default().serve(url, "example.com.zip");
    let (dir, context) = fast_context(&site);

    let stats = workflows::run_batch(&context, &[url.to_string(), url.to_string()])
        .await
        .unwrap();

    assert_eq!(stats.success, 2);
    let files = zip_files(dir.path());
    assert_eq!(files.len(), 2, "{:?}", files);
    assert_eq!(files[0], "index.zip");
    assert!(files[1].starts_with("index_") && files[1].ends_with(".zip"), "{:?}", files);
    for name in &files {
        assert!(std::fs::metadata(dir.path().join(name)).unwrap().len() > 0);
    }
}

#[tokio::test]
async fn test_ui_timeout_skips_url_and_batch_continues() {
    let stuck = "https://stuck.example/";
    let good = "https://example.com/docs/guide.html";
    let site = FakeSite::default().serve(good, "example.com.zip");
    let (dir, context) = fast_context(&site);

    let stats = workflows::run_batch(&context, &[stuck.to_string(), good.to_string()])
        .await
        .unwrap();

    assert_eq!((stats.total, stats.success, stats.failed), (2, 1, 1));
    assert_eq!(zip_files(dir.path()), vec!["guide.zip"]);
    // 失败的链接同样会关闭页面
    assert_eq!(*site.pages_opened.lock().unwrap(), 2);
    assert_eq!(*site.pages_closed.lock().unwrap(), 2);
    assert!(site.session_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancelled_batch_stops_before_next_url() {
    let url = "https://example.com/a.html";
    let site = FakeSite::default().serve(url, "a.zip");
    let (dir, context) = fast_context(&site);
    context.cancellation_token.cancel();

    let result = workflows::run_batch(&context, &[url.to_string()]).await;

    assert!(result.is_err());
    assert_eq!(*site.pages_opened.lock().unwrap(), 0);
    assert!(zip_files(dir.path()).is_empty());
    assert!(site.session_closed.load(Ordering::SeqCst));
}
