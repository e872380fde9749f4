//! 提示音合成
//!
//! 一个 `Phrase` 是若干 `ToneSegment` 的序列 (含静音段)。每个音用正弦振荡器生成,
//! 经过 attack-sustain-release 包络和一阶低通滤波, 避免爆音和刺耳的高频。

use std::f32::consts::PI;
use std::time::Duration;

pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// 单个音段; `frequency_hz` 或 `volume` 为 0 时表示静音
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSegment {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub volume: f32,
}

impl ToneSegment {
    pub const fn tone(frequency_hz: f32, duration_ms: u32, volume: f32) -> Self {
        Self {
            frequency_hz,
            duration_ms,
            volume,
        }
    }

    pub const fn silence(duration_ms: u32) -> Self {
        Self {
            frequency_hz: 0.0,
            duration_ms,
            volume: 0.0,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.frequency_hz <= 0.0 || self.volume <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    segments: Vec<ToneSegment>,
}

impl Phrase {
    pub fn new(segments: Vec<ToneSegment>) -> Self {
        Self { segments }
    }

    /// 新订单提示: C5-E5-G5 轻柔上行三音
    pub fn order_chime() -> Self {
        Self::new(vec![
            ToneSegment::tone(523.25, 160, 0.16),
            ToneSegment::silence(60),
            ToneSegment::tone(659.25, 160, 0.16),
            ToneSegment::silence(60),
            ToneSegment::tone(783.99, 280, 0.12),
            ToneSegment::silence(300),
        ])
    }

    pub fn segments(&self) -> &[ToneSegment] {
        &self.segments
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.segments.iter().map(|s| u64::from(s.duration_ms)).sum())
    }
}

impl Default for Phrase {
    fn default() -> Self {
        Self::order_chime()
    }
}

/// 合成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub lowpass_hz: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            attack_ms: 12.0,
            release_ms: 80.0,
            lowpass_hz: 2_000.0,
        }
    }
}

/// 把整段 phrase 渲染成单声道 f32 样本
pub fn render_phrase(phrase: &Phrase, settings: &RenderSettings) -> Vec<f32> {
    let total: usize = phrase
        .segments()
        .iter()
        .map(|s| segment_len(s, settings.sample_rate))
        .sum();
    let mut out = Vec::with_capacity(total);
    for segment in phrase.segments() {
        render_segment(segment, settings, &mut out);
    }
    out
}

fn segment_len(segment: &ToneSegment, sample_rate: u32) -> usize {
    (u64::from(sample_rate) * u64::from(segment.duration_ms) / 1000) as usize
}

fn render_segment(segment: &ToneSegment, settings: &RenderSettings, out: &mut Vec<f32>) {
    let n = segment_len(segment, settings.sample_rate);
    if segment.is_silent() {
        out.extend(std::iter::repeat(0.0).take(n));
        return;
    }

    let rate = settings.sample_rate as f32;
    let attack = ms_to_samples(settings.attack_ms, rate).min(n / 2);
    let release = ms_to_samples(settings.release_ms, rate).min(n / 2);
    let alpha = 1.0 - (-2.0 * PI * settings.lowpass_hz / rate).exp();
    let step = 2.0 * PI * segment.frequency_hz / rate;

    let mut filtered = 0.0f32;
    for i in 0..n {
        let gain = envelope_gain(i, n, attack, release);
        let raw = (step * i as f32).sin() * segment.volume * gain;
        filtered += alpha * (raw - filtered);
        out.push(filtered);
    }
}

fn ms_to_samples(ms: f32, rate: f32) -> usize {
    (ms.max(0.0) * rate / 1000.0) as usize
}

fn envelope_gain(i: usize, n: usize, attack: usize, release: usize) -> f32 {
    let mut gain = 1.0f32;
    if attack > 0 && i < attack {
        gain = gain.min(i as f32 / attack as f32);
    }
    let remaining = n - 1 - i;
    if release > 0 && remaining < release {
        gain = gain.min(remaining as f32 / release as f32);
    }
    gain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_length_matches_duration() {
        let phrase = Phrase::order_chime();
        let settings = RenderSettings::default();
        let samples = render_phrase(&phrase, &settings);
        let expected: usize = phrase
            .segments()
            .iter()
            .map(|s| segment_len(s, settings.sample_rate))
            .sum();
        assert_eq!(samples.len(), expected);
        assert_eq!(phrase.duration(), Duration::from_millis(1020));
    }

    #[test]
    fn test_tone_never_exceeds_volume_and_starts_soft() {
        let phrase = Phrase::new(vec![ToneSegment::tone(880.0, 200, 0.25)]);
        let samples = render_phrase(&phrase, &RenderSettings::default());

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.25 + f32::EPSILON, "peak {}", peak);
        assert!(peak > 0.1, "tone should be audible, peak {}", peak);

        // 包络两端接近 0, 无爆音
        assert!(samples[0].abs() < 1e-6);
        assert!(samples.last().unwrap().abs() < 0.01);
        assert!(samples[..10].iter().all(|s| s.abs() < 0.05));
    }

    #[test]
    fn test_silence_is_zero() {
        let phrase = Phrase::new(vec![
            ToneSegment::silence(50),
            ToneSegment::tone(0.0, 50, 0.5),
            ToneSegment::tone(440.0, 50, 0.0),
        ]);
        let samples = render_phrase(&phrase, &RenderSettings::default());
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_envelope_clamped_on_short_tones() {
        // 5ms 的音比 attack+release 短, 包络不能越界
        let phrase = Phrase::new(vec![ToneSegment::tone(440.0, 5, 0.5)]);
        let samples = render_phrase(&phrase, &RenderSettings::default());
        assert_eq!(samples.len(), 110);
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn test_lowpass_softens_high_tones() {
        let settings = RenderSettings::default();
        let low = render_phrase(&Phrase::new(vec![ToneSegment::tone(300.0, 200, 0.5)]), &settings);
        let high = render_phrase(&Phrase::new(vec![ToneSegment::tone(6_000.0, 200, 0.5)]), &settings);
        let peak = |s: &[f32]| s.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(peak(&high) < peak(&low));
    }
}
