// SCHEDCMP SCOPED PROCESS GROUP
// THE CHILD RUNS IN ITS OWN PROCESS GROUP SO A SIGNAL REACHES THE WORKLOAD
// LOOP AND EVERYTHING IT FORKED, NOT JUST THE make THAT STARTED IT.
//
// RELEASE IS TWO-PHASE: SIGINT TO THE GROUP, BOUNDED WAIT, SIGKILL.
// RUNS ON EVERY EXIT PATH (EXPLICIT release() OR DROP).
// SIGNAL DELIVERY IS BEST-EFFORT. FAILURES ARE LOGGED, NEVER RETURNED.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// PGID OF THE GROUP CURRENTLY RUNNING A TRIAL (0 = NONE).
// READ FROM THE CTRL+C HANDLER, WHICH MUST NOT TOUCH THE Child ITSELF.
static ACTIVE_GROUP: AtomicI32 = AtomicI32::new(0);

fn signal_group(pgid: i32, sig: libc::c_int) -> bool {
    if pgid <= 0 {
        return false;
    }
    let rc = unsafe { libc::killpg(pgid, sig) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        info!(pgid, sig, error = %err, "signal delivery to process group failed");
        return false;
    }
    true
}

// FORWARD AN INTERRUPT TO WHATEVER TRIAL IS RUNNING. SAFE TO CALL FROM
// A SIGNAL-HANDLING THREAD; DOES NOTHING WHEN NO TRIAL IS ACTIVE.
pub fn interrupt_active() {
    let pgid = ACTIVE_GROUP.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::killpg(pgid, libc::SIGINT);
        }
    }
}

// SECOND-CHANCE ESCALATION FOR A WORKLOAD THAT IGNORES THE INTERRUPT
pub fn kill_active() {
    let pgid = ACTIVE_GROUP.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

pub struct ProcessGroup {
    child: Option<Child>,
    pgid: i32,
    grace: Duration,
}

impl ProcessGroup {
    // SPAWN cmd AS THE LEADER OF A NEW PROCESS GROUP
    pub fn spawn(cmd: &mut Command, grace: Duration) -> io::Result<Self> {
        let child = cmd.process_group(0).spawn()?;
        let pid = child.id() as i32;
        let pgid = match unsafe { libc::getpgid(pid) } {
            -1 => {
                debug!(pid, "getpgid failed, using pid as group id");
                pid
            }
            g => g,
        };
        ACTIVE_GROUP.store(pgid, Ordering::SeqCst);
        debug!(pid, pgid, "spawned process group");
        Ok(Self {
            child: Some(child),
            pgid,
            grace,
        })
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    // INTERRUPT, WAIT UP TO grace, THEN KILL. IDEMPOTENT.
    // THE KILL ALWAYS HAPPENS: A LEADER THAT DIED ON SIGINT CAN LEAVE
    // DESCENDANTS BEHIND (BACKGROUND JOBS OF sh IGNORE SIGINT).
    // RETURNS THE EXIT STATUS WHEN ONE COULD BE COLLECTED.
    pub fn release(&mut self) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        let _ = ACTIVE_GROUP.compare_exchange(self.pgid, 0, Ordering::SeqCst, Ordering::SeqCst);
        let pid = child.id() as libc::pid_t;

        // THE LEADER STAYS UNREAPED UNTIL AFTER SIGKILL. A ZOMBIE LEADER
        // PINS THE PGID, SO NEITHER SIGNAL CAN HIT A RECYCLED GROUP.
        signal_group(self.pgid, libc::SIGINT);
        debug!(pgid = self.pgid, "sent SIGINT, waiting {:?}", self.grace);

        let deadline = Instant::now() + self.grace;
        while !leader_exited(pid) {
            if Instant::now() >= deadline {
                debug!(pgid = self.pgid, "grace period elapsed");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        debug!(pgid = self.pgid, "sending SIGKILL");
        signal_group(self.pgid, libc::SIGKILL);
        let _ = child.kill();
        match child.wait() {
            Ok(status) => Some(status),
            Err(e) => {
                info!(pgid = self.pgid, error = %e, "reaping child failed");
                None
            }
        }
    }
}

// HAS THE LEADER EXITED? PEEKS WITHOUT REAPING (WNOWAIT).
fn leader_exited(pid: libc::pid_t) -> bool {
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc != 0 {
        let err = io::Error::last_os_error();
        info!(pid, error = %err, "waitid on leader failed");
        return true;
    }
    // WNOHANG WITH NOTHING TO REPORT LEAVES si_pid ZERO
    unsafe { info.si_pid() != 0 }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.release();
        }
    }
}
