//! Terminal progress for tile downloads.

use std::sync::{Arc, LazyLock, Mutex};

use himawari::executor::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

static TILE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("Downloading tiles [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
});

/// One bar per tile batch, created on the first report and cleared when the
/// batch completes.
#[derive(Default)]
pub struct TileProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TileProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callback handed to the acquirer.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let this = Arc::clone(self);
        Arc::new(move |done: usize, total: usize| this.update(done, total))
    }

    fn update(&self, done: usize, total: usize) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(TILE_STYLE.clone());
            bar
        });
        bar.set_position(done as u64);
        if done >= total {
            bar.finish_and_clear();
            *slot = None;
        }
    }
}
