use crate::error::AudioError;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// 平台是否具备音频能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSupport {
    Supported,
    Unsupported,
}

/// 平台音频输出
#[async_trait]
pub trait AudioOutput: Send + Sync {
    fn support(&self) -> AudioSupport {
        AudioSupport::Supported
    }

    /// 唤醒被挂起的音频上下文
    async fn activate(&self) -> Result<(), AudioError>;

    /// 播放一段单声道样本, 播完后返回
    async fn play(&self, samples: Arc<[f32]>, sample_rate: u32) -> Result<(), AudioError>;
}

/// 无音频能力
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

#[async_trait]
impl AudioOutput for Unsupported {
    fn support(&self) -> AudioSupport {
        AudioSupport::Unsupported
    }

    async fn activate(&self) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }

    async fn play(&self, _samples: Arc<[f32]>, _sample_rate: u32) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }
}

/// 把每段提示音写成 WAV 文件, 由前台音箱进程取走播放
///
/// 写完后按 phrase 时长等待, 保证重复节奏和真实播放一致。
#[derive(Debug, Clone)]
pub struct WavOutput {
    path: PathBuf,
}

impl WavOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioOutput for WavOutput {
    async fn activate(&self) -> Result<(), AudioError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    async fn play(&self, samples: Arc<[f32]>, sample_rate: u32) -> Result<(), AudioError> {
        let path = self.path.clone();
        let frames = samples.len();
        tokio::task::spawn_blocking(move || write_wav(&path, &samples, sample_rate))
            .await
            .map_err(|e| AudioError::Output(format!("WAV writer task failed: {}", e)))??;

        tracing::debug!("提示音已写入 {:?}, {} 帧", self.path, frames);
        if sample_rate > 0 {
            tokio::time::sleep(Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))).await;
        }
        Ok(())
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_output_is_silent() {
        let output = Unsupported;
        assert_eq!(output.support(), AudioSupport::Unsupported);
        assert!(output.activate().await.is_err());
    }

    #[tokio::test]
    async fn test_wav_output_writes_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts").join("order.wav");
        let output = WavOutput::new(&path);

        output.activate().await.unwrap();
        let samples: Arc<[f32]> = vec![0.0, 0.5, -0.5, 1.5].into();
        output.play(samples, 8_000).await.unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 8_000);
        let written: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0, 16383, -16383, i16::MAX]);
    }
}
