// Editing session: one audio file, one annotation table, one playback engine
// The explicit context object the UI adapter drives; there is no global
// state, so independent sessions can coexist

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use log::info;

use crate::annotations::rttm::{self, RttmError};
use crate::annotations::store::AnnotationStore;
use crate::audio::buffer::AudioBuffer;
use crate::audio::controller::{PlaybackController, PlaybackTick};
use crate::audio::decoder::DecodeError;
use crate::audio::output::PlaybackError;
use crate::settings::EditorSettings;

/// One editing session.
///
/// All operations are issued from the UI-driving thread; the annotation
/// store and audio buffer are single-writer by that convention. Only the
/// playback fields are shared with the background worker, and those are
/// guarded inside the controller.
pub struct EditorSession {
    audio: Option<Arc<AudioBuffer>>,
    audio_path: Option<PathBuf>,
    playback: PlaybackController,
    annotations: AnnotationStore,
    settings: EditorSettings,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::with_settings(EditorSettings::default())
    }

    pub fn with_settings(settings: EditorSettings) -> Self {
        let playback =
            PlaybackController::new(Duration::from_millis(settings.poll_interval_ms));
        playback.set_volume(settings.volume);
        Self {
            audio: None,
            audio_path: None,
            playback,
            annotations: AnnotationStore::new(),
            settings,
        }
    }

    /// Decode an audio file and make it the session waveform.
    ///
    /// Stops any running playback and rewinds to zero. On failure the
    /// previously loaded audio (and position) is kept.
    pub fn load_audio<P: AsRef<Path>>(&mut self, path: P) -> Result<(), DecodeError> {
        let path = path.as_ref();
        let buffer = Arc::new(AudioBuffer::load(path)?);
        self.playback.set_buffer(Some(buffer.clone()));
        self.audio = Some(buffer);
        self.audio_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Load an RTTM file, replacing the whole annotation table.
    ///
    /// The replacement is atomic: a parse failure leaves the current table
    /// untouched. Returns the number of records loaded.
    pub fn load_rttm<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, RttmError> {
        let records = rttm::read_file(path)?;
        let count = records.len();
        self.annotations.replace_all(records);
        info!("annotation table replaced with {} records", count);
        Ok(count)
    }

    /// Write the current annotation table to an RTTM file.
    pub fn save_rttm<P: AsRef<Path>>(&self, path: P) -> Result<(), RttmError> {
        rttm::write_file(path, self.annotations.iter().map(|(_, record)| record))
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.playback.play()
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    pub fn seek(&mut self, target_secs: f64) -> Result<(), PlaybackError> {
        self.playback.seek(target_secs)
    }

    /// Clamped to [0, 1]; applies from the next `play()`.
    pub fn set_volume(&mut self, volume: f32) {
        self.playback.set_volume(volume);
        self.settings.volume = self.playback.volume();
    }

    pub fn volume(&self) -> f32 {
        self.playback.volume()
    }

    pub fn position_secs(&self) -> f64 {
        self.playback.position_secs()
    }

    /// 0.0 while no audio is loaded.
    pub fn duration_secs(&self) -> f64 {
        self.playback.duration_secs()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Lossy position-update stream for a progress indicator; poll the
    /// getters for authoritative state.
    pub fn subscribe_playback(&self) -> Receiver<PlaybackTick> {
        self.playback.subscribe()
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    /// File name of the loaded audio, for a "Loaded: ..." label.
    pub fn audio_file_name(&self) -> Option<String> {
        self.audio_path
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Format seconds as MM:SS for a time label.
pub fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
