use std::sync::Arc;

use super::track::{LocalTrack, RemoteTrack, Track, TrackKind};

pub type LocalStream = MediaStream<LocalTrack>;
pub type RemoteStream = MediaStream<RemoteTrack>;

/// Ordered aggregate of tracks holding at most one track per kind.
#[derive(Debug)]
pub struct MediaStream<T> {
    id: String,
    tracks: Vec<Arc<T>>,
}

impl<T> Clone for MediaStream<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            tracks: self.tracks.clone(),
        }
    }
}

impl<T: Track> MediaStream<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<T>] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Arc<T>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<TrackKind> {
        self.tracks.iter().map(|t| t.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Adds `track`, evicting and returning the previous track of its kind
    pub fn add(&mut self, track: Arc<T>) -> Option<Arc<T>> {
        let evicted = self.remove(track.kind());
        self.tracks.push(track);
        evicted
    }

    pub fn remove(&mut self, kind: TrackKind) -> Option<Arc<T>> {
        let index = self.tracks.iter().position(|t| t.kind() == kind)?;
        Some(self.tracks.remove(index))
    }

    pub fn clear(&mut self) -> Vec<Arc<T>> {
        std::mem::take(&mut self.tracks)
    }
}
