use super::output::{AudioOutput, AudioSupport, Unsupported};
use super::tone::{render_phrase, Phrase, RenderSettings};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 音频输出工厂; 返回 None 表示平台没有音频能力
pub type OutputFactory = Box<dyn Fn() -> Option<Arc<dyn AudioOutput>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub phrase: Phrase,
    pub render: RenderSettings,
    pub repeat_interval: Duration,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            phrase: Phrase::order_chime(),
            render: RenderSettings::default(),
            repeat_interval: Duration::from_secs(6),
        }
    }
}

/// 已登记但尚未开始的一轮提示
pub struct AlertCycle {
    output: Arc<dyn AudioOutput>,
    token: CancellationToken,
}

struct Inner {
    factory: OutputFactory,
    output: OnceLock<Arc<dyn AudioOutput>>,
    samples: Arc<[f32]>,
    sample_rate: u32,
    repeat_interval: Duration,
    /// 当前重复计时器; 同一时刻最多一个
    timer: Mutex<Option<CancellationToken>>,
    playing: AtomicBool,
    phrases_started: AtomicU64,
}

/// 新订单提示音
///
/// 由组合根显式创建, 以 clone 的方式共享给需要的组件。音频上下文在第一次使用时才创建。
#[derive(Clone)]
pub struct AlertGenerator {
    inner: Arc<Inner>,
}

impl AlertGenerator {
    pub fn new(settings: AlertSettings, factory: OutputFactory) -> Self {
        let samples: Arc<[f32]> = render_phrase(&settings.phrase, &settings.render).into();
        Self {
            inner: Arc::new(Inner {
                factory,
                output: OnceLock::new(),
                samples,
                sample_rate: settings.render.sample_rate,
                repeat_interval: settings.repeat_interval,
                timer: Mutex::new(None),
                playing: AtomicBool::new(false),
                phrases_started: AtomicU64::new(0),
            }),
        }
    }

    pub fn with_output(settings: AlertSettings, output: Arc<dyn AudioOutput>) -> Self {
        Self::new(settings, Box::new(move || Some(output.clone())))
    }

    /// 静音实现, 所有操作都是 no-op
    pub fn unsupported() -> Self {
        Self::new(AlertSettings::default(), Box::new(|| None::<Arc<dyn AudioOutput>>))
    }

    fn output(&self) -> &Arc<dyn AudioOutput> {
        self.inner.output.get_or_init(|| match (self.inner.factory)() {
            Some(output) => {
                tracing::info!("Audio context created ({:?})", output.support());
                output
            }
            None => {
                tracing::info!("Audio unsupported on this platform, alerts will be silent");
                Arc::new(Unsupported) as Arc<dyn AudioOutput>
            }
        })
    }

    /// 返回可播放的输出; 不支持时为 None
    fn usable_output(&self) -> Option<Arc<dyn AudioOutput>> {
        let output = self.output();
        match output.support() {
            AudioSupport::Supported => Some(output.clone()),
            AudioSupport::Unsupported => None,
        }
    }

    pub fn support(&self) -> AudioSupport {
        self.output().support()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    /// 已开始播放的 phrase 次数
    pub fn phrases_started(&self) -> u64 {
        self.inner.phrases_started.load(Ordering::SeqCst)
    }

    /// 播放一次提示, 之后每隔 `repeat_interval` 重复, 直到 `stop_alert`
    ///
    /// 正在播放时再次调用会重新开始计时, 不会叠加计时器。
    pub async fn play_order_alert(&self) {
        if let Some(cycle) = self.arm_alert() {
            self.start_alert(cycle).await;
        }
    }

    /// 登记新的重复计时器并取消旧的, 不等待任何 I/O
    ///
    /// 登记之后的 `stop_alert` 一定能取消这一轮提示。
    pub fn arm_alert(&self) -> Option<AlertCycle> {
        let output = self.usable_output()?;
        let token = CancellationToken::new();
        let previous = self.timer().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
            tracing::debug!("Alert already playing, restarting repeat cycle");
        }
        Some(AlertCycle { output, token })
    }

    /// 唤醒音频上下文后开始 `arm_alert` 登记的一轮提示
    pub async fn start_alert(&self, cycle: AlertCycle) {
        let AlertCycle { output, token } = cycle;

        if let Err(e) = output.activate().await {
            tracing::warn!("Audio context could not be resumed: {}", e);
            token.cancel();
            let mut timer = self.timer();
            if timer.as_ref().is_some_and(CancellationToken::is_cancelled) {
                *timer = None;
                self.inner.playing.store(false, Ordering::SeqCst);
            }
            return;
        }

        {
            let _timer = self.timer();
            if token.is_cancelled() {
                tracing::debug!("Alert stopped before playback started");
                return;
            }
            self.inner.playing.store(true, Ordering::SeqCst);
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }
                inner.start_phrase(output.clone());
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(inner.repeat_interval) => {}
                }
            }
        });
    }

    /// 停止重复; 正在播放的 phrase 自然结束
    pub fn stop_alert(&self) {
        let mut timer = self.timer();
        if let Some(token) = timer.take() {
            token.cancel();
            tracing::debug!("Alert repeat timer cleared");
        }
        self.inner.playing.store(false, Ordering::SeqCst);
    }

    /// `playing` 只在持有这把锁时修改
    fn timer(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 唤醒音频上下文 (部分平台需要用户手势之后才能出声)
    pub async fn request_audio_permission(&self) -> bool {
        let Some(output) = self.usable_output() else {
            return false;
        };
        match output.activate().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Audio activation refused: {}", e);
                false
            }
        }
    }
}

impl Inner {
    fn start_phrase(&self, output: Arc<dyn AudioOutput>) {
        self.phrases_started.fetch_add(1, Ordering::SeqCst);
        let samples = self.samples.clone();
        let sample_rate = self.sample_rate;
        tokio::spawn(async move {
            if let Err(e) = output.play(samples, sample_rate).await {
                tracing::warn!("Alert phrase playback failed: {}", e);
            }
        });
    }
}
