// Shared test helpers

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use resmon::error::{Result, SamplerError};
use resmon::sampler::{Priority, Sampler};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// What a [`RecordingSampler`] saw, shared with the test body.
#[derive(Debug, Default)]
pub struct Journal {
    /// (sampler name, tokio clock at sample time)
    pub samples: Vec<(String, tokio::time::Instant)>,
    pub wall: Vec<DateTime<Utc>>,
    pub closes: Vec<String>,
}

pub type SharedJournal = Rc<RefCell<Journal>>;

pub fn journal() -> SharedJournal {
    Rc::new(RefCell::new(Journal::default()))
}

/// In-memory sampler that logs every call and can be told to fail.
pub struct RecordingSampler {
    pub name: String,
    pub priority: Priority,
    pub journal: SharedJournal,
    /// Fail on this (1-based) sample.
    pub fail_on: Option<usize>,
    /// Block the thread this long on the first sample.
    pub first_sample_delay: Option<std::time::Duration>,
    pub fail_close: bool,
    samples: usize,
    closed: bool,
}

impl RecordingSampler {
    pub fn new(name: &str, priority: Priority, journal: &SharedJournal) -> Self {
        Self {
            name: name.to_string(),
            priority,
            journal: journal.clone(),
            fail_on: None,
            first_sample_delay: None,
            fail_close: false,
            samples: 0,
            closed: false,
        }
    }

    pub fn boxed(self) -> Box<dyn Sampler> {
        Box::new(self)
    }
}

impl Sampler for RecordingSampler {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn sample(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.samples += 1;
        if self.samples == 1
            && let Some(delay) = self.first_sample_delay
        {
            std::thread::sleep(delay);
        }
        if self.fail_on == Some(self.samples) {
            return Err(SamplerError::Host(format!("{} failed", self.name)));
        }
        let mut j = self.journal.borrow_mut();
        j.samples.push((self.name.clone(), tokio::time::Instant::now()));
        j.wall.push(at);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.journal.borrow_mut().closes.push(self.name.clone());
        if self.fail_close {
            return Err(SamplerError::Host(format!("{} close failed", self.name)));
        }
        Ok(())
    }
}

/// Lines of a sampler output split into fields.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(path).expect("read output");
    assert!(
        content.is_empty() || content.ends_with('\n'),
        "{} ends with a truncated line",
        path.display()
    );
    content
        .lines()
        .map(|l| l.split(", ").map(str::to_string).collect())
        .collect()
}

/// Asserts every data row has the header's arity and returns the data rows.
pub fn assert_arity(path: &Path) -> Vec<Vec<String>> {
    let mut rows = read_rows(path);
    assert!(!rows.is_empty(), "{} has no header", path.display());
    let header = rows.remove(0);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(
            row.len(),
            header.len(),
            "{} row {} arity differs from header",
            path.display(),
            i + 1
        );
    }
    rows
}

pub fn column(rows: &[Vec<String>], header: &[String], name: &str) -> Vec<String> {
    let idx = header
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("no column {}", name));
    rows.iter().map(|r| r[idx].clone()).collect()
}

/// Direct children of `pid`, from the ppid field of every /proc/<n>/stat.
pub fn children_of(pid: u32) -> Vec<u32> {
    let mut kids = Vec::new();
    for entry in std::fs::read_dir("/proc").unwrap().flatten() {
        let Ok(n) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        let Some((_, rest)) = stat.rsplit_once(')') else {
            continue;
        };
        let ppid = rest.split_whitespace().nth(1).and_then(|p| p.parse::<u32>().ok());
        if ppid == Some(pid) {
            kids.push(n);
        }
    }
    kids
}

pub fn is_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
