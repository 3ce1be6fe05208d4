// Linux-specific helpers: /proc and /sys counters that sysinfo does not expose.

use crate::models::DiskCounters;

/// Kernel diskstats sectors are always 512 bytes, whatever the device block size.
const SECTOR_SIZE: u64 = 512;

/// Counters of one process read from `/proc/<pid>/{status,io}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ProcfsCounters {
    pub threads: u64,
    pub ctx_switches: u64,
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Sum `/proc/diskstats` rows for which `is_whole_disk(name)` holds.
pub(crate) fn parse_diskstats(content: &str, is_whole_disk: impl Fn(&str) -> bool) -> DiskCounters {
    let mut total = DiskCounters::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 || !is_whole_disk(parts[2]) {
            continue;
        }
        let get = |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };
        total += DiskCounters {
            read_count: get(3),
            read_bytes: get(5) * SECTOR_SIZE,
            read_time_ms: get(6),
            write_count: get(7),
            write_bytes: get(9) * SECTOR_SIZE,
            write_time_ms: get(10),
        };
    }
    total
}

/// `Threads` and voluntary + involuntary context switches from `/proc/<pid>/status`.
/// `None` when the content has no `Threads` line (not a status file, or truncated).
pub(crate) fn parse_process_status(content: &str) -> Option<(u64, u64)> {
    let mut threads = None;
    let mut ctx = 0u64;
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Threads" => threads = value.parse().ok(),
            "voluntary_ctxt_switches" | "nonvoluntary_ctxt_switches" => {
                ctx += value.parse::<u64>().unwrap_or(0)
            }
            _ => {}
        }
    }
    threads.map(|t| (t, ctx))
}

/// `(syscr, syscw, read_bytes, write_bytes)` from `/proc/<pid>/io`.
pub(crate) fn parse_process_io(content: &str) -> (u64, u64, u64, u64) {
    let (mut syscr, mut syscw, mut read_bytes, mut write_bytes) = (0, 0, 0, 0);
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value: u64 = value.trim().parse().unwrap_or(0);
            match key.trim() {
                "syscr" => syscr = value,
                "syscw" => syscw = value,
                "read_bytes" => read_bytes = value,
                "write_bytes" => write_bytes = value,
                _ => {}
            }
        }
    }
    (syscr, syscw, read_bytes, write_bytes)
}

/// Disk counters summed over whole block devices (partitions excluded).
pub(super) fn read_disk_counters() -> std::io::Result<DiskCounters> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/diskstats")?;
        Ok(parse_diskstats(&content, |name| {
            std::path::Path::new("/sys/block")
                .join(name.replace('/', "!"))
                .exists()
        }))
    }
    #[cfg(not(target_os = "linux"))]
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

/// Read `(rx_dropped, tx_dropped)` from /sys/class/net/<interface>/statistics; 0 when unavailable.
pub(super) fn read_interface_drops(interface_name: &str) -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let read = |counter: &str| -> u64 {
            std::fs::read_to_string(format!(
                "/sys/class/net/{}/statistics/{}",
                interface_name, counter
            ))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
        };
        (read("rx_dropped"), read("tx_dropped"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface_name;
        (0, 0)
    }
}

/// Per-process counters. Fails when the process is gone or its files are unreadable.
pub(super) fn read_process_counters(pid: u32) -> std::io::Result<ProcfsCounters> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string(format!("/proc/{}/status", pid))?;
        let (threads, ctx_switches) = parse_process_status(&status).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "no Threads line in status")
        })?;
        // /proc/<pid>/io needs ptrace access; without it the I/O columns read 0.
        let (read_count, write_count, read_bytes, write_bytes) =
            match std::fs::read_to_string(format!("/proc/{}/io", pid)) {
                Ok(io) => parse_process_io(&io),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => (0, 0, 0, 0),
                Err(e) => return Err(e),
            };
        Ok(ProcfsCounters {
            threads,
            ctx_switches,
            read_count,
            write_count,
            read_bytes,
            write_bytes,
        })
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }
}

/// Set this process's niceness (negative values need privileges).
pub(crate) fn set_niceness(nice: i32) -> std::io::Result<()> {
    // SAFETY: setpriority only reads its scalar arguments.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Send SIGTERM to `pid`.
pub(crate) fn terminate(pid: u32) -> std::io::Result<()> {
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
