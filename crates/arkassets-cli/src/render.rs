//! Terminal rendering of batch progress and package listings

use arkassets_protocol::{AssetManifest, Progress, ProgressSnapshot, format_size};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const REFRESH: Duration = Duration::from_millis(200);
const BAR_TEMPLATE: &str = "{prefix:>7} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// One line per package: key, file count and declared size
pub fn package_table(manifest: &AssetManifest) -> Vec<String> {
    let width = manifest.packages.keys().map(String::len).max().unwrap_or(0);
    let mut lines: Vec<String> = manifest
        .packages
        .iter()
        .map(|(key, package)| {
            format!(
                "{key:<width$}  {:>6} files  {:>10}",
                package.files.len(),
                format_size(package.total_size)
            )
        })
        .collect();
    lines.push(format!(
        "{} packages, {} files, {}",
        manifest.packages.len(),
        manifest.file_count(),
        format_size(manifest.total_size)
    ));
    lines
}

/// Short status line for a snapshot
pub fn status_line(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!("{} downloaded", format_size(snapshot.downloaded_bytes));
    if let Some(last) = snapshot.recent.last() {
        line.push_str(" | ");
        line.push_str(last);
    }
    line
}

fn bar(multi: &MultiProgress, prefix: &'static str) -> ProgressBar {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let bar = multi.add(ProgressBar::new(0));
    bar.set_style(style);
    bar.set_prefix(prefix);
    bar
}

struct Bars {
    total: ProgressBar,
    unzip: ProgressBar,
    unpack: ProgressBar,
}

impl Bars {
    fn apply(&self, snapshot: &ProgressSnapshot) {
        for (bar, done, target) in [
            (&self.total, snapshot.total, snapshot.total_target),
            (&self.unzip, snapshot.unzip, snapshot.unzip_target),
            (&self.unpack, snapshot.unpack, snapshot.unpack_target),
        ] {
            bar.set_length(target);
            bar.set_position(done);
        }
        self.total.set_message(status_line(snapshot));
    }

    fn finish(&self) {
        self.total.finish();
        self.unzip.finish();
        self.unpack.finish();
    }
}

/// Polls a [`Progress`] and redraws three bars until finished
pub struct ProgressView {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProgressView {
    pub fn start(multi: &MultiProgress, progress: Arc<Progress>) -> Self {
        let bars = Bars {
            total: bar(multi, "total"),
            unzip: bar(multi, "unzip"),
            unpack: bar(multi, "unpack"),
        };
        let (stop, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH);
            loop {
                tokio::select! {
                    _ = ticker.tick() => bars.apply(&progress.snapshot()),
                    _ = &mut stopped => break,
                }
            }
            bars.apply(&progress.snapshot());
            bars.finish();
        });

        Self {
            stop: Some(stop),
            task,
        }
    }

    /// Draw the final state and stop polling
    pub async fn finish(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::debug!("Progress view task ended abnormally: {}", e);
        }
    }
}
