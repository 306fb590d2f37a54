//! The smart check: prepare a snapshot, run the verifier, classify, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;

use super::classify::classify;
use super::runner::{RunLimits, TestRunner, run_process};
use super::snapshot::{self, ResourceCopy};
use crate::config::CheckerConfig;
use crate::course::{StudyStatus, TaskFile};
use crate::document::Document;
use crate::error::Result;

/// The reference side of a check: the answer file and its placeholders.
#[derive(Clone, Copy, Debug)]
pub struct AnswerSource<'a> {
    pub file: &'a Path,
    pub task_file: &'a TaskFile,
    pub resource: Option<&'a ResourceCopy>,
}

impl<'a> AnswerSource<'a> {
    pub fn new(file: &'a Path, task_file: &'a TaskFile) -> Self {
        Self {
            file,
            task_file,
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: &'a ResourceCopy) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// Everything needed to check one placeholder.
#[derive(Clone, Copy)]
pub struct CheckRequest<'a> {
    pub index: usize,
    pub answer: AnswerSource<'a>,
    pub user_task_file: &'a TaskFile,
    pub user_document: &'a (dyn Document + Sync),
}

/// Result of a completed check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckOutcome {
    pub index: usize,
    pub status: StudyStatus,
    /// Verifier text the status was derived from
    pub output: String,
}

/// Checks answer placeholders against a reference solution.
pub struct SmartChecker<R> {
    runner: R,
    config: CheckerConfig,
    dispatch: Option<Dispatch>,
    locks: SnapshotLocks,
}

impl<R: TestRunner> SmartChecker<R> {
    pub fn new(runner: R) -> Self {
        Self::with_config(runner, CheckerConfig::default())
    }

    pub fn with_config(runner: R, config: CheckerConfig) -> Self {
        Self {
            runner,
            config,
            dispatch: None,
            locks: SnapshotLocks::default(),
        }
    }

    /// Send this checker's events to `dispatch` instead of the global default.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Check one placeholder without touching the user's task file.
    pub fn check(&self, request: &CheckRequest<'_>) -> Result<CheckOutcome> {
        self.check_with_cancel(request, &CancellationToken::new())
    }

    /// Like [`SmartChecker::check`], stopping the test process once `cancel`
    /// fires.
    pub fn check_with_cancel(
        &self,
        request: &CheckRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome> {
        self.in_scope(|| self.run_check(request, cancel))
    }

    /// Check one placeholder and record the verdict on `user_task_file`.
    ///
    /// Errors are logged and swallowed: the placeholder keeps whatever status
    /// it had before, and `None` is returned.
    pub fn smart_check(
        &self,
        index: usize,
        answer: &AnswerSource<'_>,
        user_task_file: &mut TaskFile,
        user_document: &(dyn Document + Sync),
    ) -> Option<StudyStatus> {
        let result = {
            let request = CheckRequest {
                index,
                answer: *answer,
                user_task_file: &*user_task_file,
                user_document,
            };
            self.check(&request)
        };
        self.in_scope(|| record(result, index, user_task_file))
    }

    /// Check several placeholders in parallel.
    pub fn check_all(&self, requests: &[CheckRequest<'_>]) -> Vec<Result<CheckOutcome>> {
        requests.par_iter().map(|request| self.check(request)).collect()
    }

    /// Check every placeholder of `user_task_file` in parallel and record the
    /// verdicts. Returns how many placeholders received a verdict.
    pub fn smart_check_all(
        &self,
        answer: &AnswerSource<'_>,
        user_task_file: &mut TaskFile,
        user_document: &(dyn Document + Sync),
    ) -> usize {
        let results = {
            let requests: Vec<_> = user_task_file
                .placeholders()
                .map(|p| CheckRequest {
                    index: p.index,
                    answer: *answer,
                    user_task_file: &*user_task_file,
                    user_document,
                })
                .collect();
            let indices: Vec<_> = requests.iter().map(|r| r.index).collect();
            indices.into_iter().zip(self.check_all(&requests)).collect::<Vec<_>>()
        };

        self.in_scope(|| {
            results
                .into_iter()
                .filter_map(|(index, result)| record(result, index, user_task_file))
                .count()
        })
    }

    fn run_check(
        &self,
        request: &CheckRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome> {
        let span = tracing::debug_span!(
            "smart_check",
            index = request.index,
            answer = %request.answer.file.display()
        );
        let _enter = span.enter();

        let path = self.snapshot_path(request)?;
        let lock = self.locks.get(path.clone());
        let result = {
            let _serial = lock.lock();
            self.check_locked(request, cancel)
        };
        self.locks.release(&path, lock);
        result
    }

    fn check_locked(
        &self,
        request: &CheckRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome> {
        let mut snapshot = snapshot::prepare(request, &self.config)?;
        let command = self.runner.command(snapshot.path());
        let output = run_process(command, &self.limits(), cancel)?;
        let text = self.runner.tests_output(&output);
        let status = classify(&text, &self.config.sentinel);
        snapshot.mark_verified();

        tracing::info!(index = request.index, ?status, "placeholder checked");
        Ok(CheckOutcome {
            index: request.index,
            status,
            output: text,
        })
    }

    fn snapshot_path(&self, request: &CheckRequest<'_>) -> Result<PathBuf> {
        let file = request.answer.file;
        let name = snapshot::snapshot_name(file, request.index, &self.config.window_postfix)?;
        Ok(file.parent().unwrap_or(Path::new("")).join(name))
    }

    fn limits(&self) -> RunLimits {
        RunLimits {
            timeout: self.config.timeout(),
            poll_interval: self.config.poll_interval(),
        }
    }

    fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

fn record(
    result: Result<CheckOutcome>,
    index: usize,
    task_file: &mut TaskFile,
) -> Option<StudyStatus> {
    match result {
        Ok(outcome) => match task_file.set_status(index, outcome.status) {
            Ok(()) => Some(outcome.status),
            Err(e) => {
                tracing::error!(index, error = %e, "cannot record check result");
                None
            }
        },
        Err(e) => {
            tracing::error!(index, kind = ?e.kind(), error = %e, "smart check failed");
            None
        }
    }
}

/// One mutex per snapshot path, so two checks never write the same file.
///
/// Entries only live while a check on that path is running or waiting.
#[derive(Default)]
struct SnapshotLocks {
    inner: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SnapshotLocks {
    fn get(&self, path: PathBuf) -> Arc<Mutex<()>> {
        self.inner.lock().entry(path).or_default().clone()
    }

    /// Give back a lock from [`SnapshotLocks::get`], dropping the entry once
    /// no other check holds it.
    fn release(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut inner = self.inner.lock();
        drop(lock);
        let unused = inner.get(path).is_some_and(|entry| Arc::strong_count(entry) == 1);
        if unused {
            inner.remove(path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
