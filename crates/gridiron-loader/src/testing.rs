//! Test doubles shared by the loader tests.

use async_trait::async_trait;
use gridiron_core::ports::{DownstreamJob, SourceReader};
use gridiron_core::{Error, NgsStatType, Result, Seasons, Table};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Source returning scripted results in order, then the last one forever.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Table>>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Table>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn returning(table: Table) -> Arc<Self> {
        Self::new(vec![Ok(table)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Table> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            return script.pop_front().unwrap();
        }
        match script.front().unwrap() {
            Ok(t) => Ok(t.clone()),
            Err(e) if e.is_transient() => Err(Error::Connection(e.to_string())),
            Err(e) => Err(Error::Internal(e.to_string())),
        }
    }
}

#[async_trait]
impl SourceReader for ScriptedSource {
    async fn player_stats(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn schedules(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn rosters(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn team_stats(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn nextgen_stats(&self, _: NgsStatType, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn snap_counts(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
    async fn injuries(&self, _: &Seasons) -> Result<Table> {
        self.next()
    }
}

/// Downstream job recording its runs into a shared log.
pub struct RecordingJob {
    pub name: String,
    pub fail: bool,
    pub log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DownstreamJob for RecordingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<()> {
        self.log.lock().unwrap().push(self.name.clone());
        if self.fail {
            return Err(Error::DownstreamFailed {
                job: self.name.clone(),
                message: "exit code 1".into(),
            });
        }
        Ok(())
    }
}
