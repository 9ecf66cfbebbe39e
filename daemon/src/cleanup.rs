/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
 */

// Derived from lib/fatal-signal.c in Open vSwitch, with the following license:
/*
 * Copyright (c) 2008, 2009, 2010, 2011, 2012, 2013 Nicira, Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at:
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use signal_hook::{self, consts::signal::*, iterator::Signals};
use std::collections::{HashMap, HashSet};
use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{event, Level};

#[cfg(doc)]
use crate::Daemonize;

/// Resources a [`Cleanup`] releases when it is dropped or the process dies from a signal. Only
/// `remove_files` is populated today — the pidfile `make_pidfile` registers for deletion — but the
/// struct stays separate from `Cleanup` itself so the signal thread can hold it independently of
/// whoever owns the `Cleanup` handle.
#[derive(Default)]
struct Actions {
    remove_files: HashSet<PathBuf>,
}

impl Actions {
    fn new() -> Actions {
        Default::default()
    }

    fn run(&mut self) {
        for file in self.remove_files.drain() {
            if let Err(err) = fs::remove_file(&file) {
                event!(Level::WARN, "{}: removing file failed ({err})", file.to_string_lossy());
            }
        }
    }
}

/// A singleton object that frees resources in reaction to a fatal signal.
struct SignalHandler {
    actions: Arc<Mutex<HashMap<u64, Arc<Mutex<Actions>>>>>,
    next_id: u64
}

impl SignalHandler {
    fn new() -> Result<SignalHandler> {
        let mut signals = Signals::new(&[SIGTERM, SIGINT, SIGHUP, SIGALRM])?;
        let actions: Arc<Mutex<HashMap<u64, Arc<Mutex<Actions>>>>>
            = Arc::new(Mutex::new(HashMap::new()));
        let actions2 = actions.clone();
        thread::spawn(move || {
            for signal in signals.forever() {
                for (_k, v) in actions2.lock().unwrap().drain() {
                    v.lock().unwrap().run();
                }
                signal_hook::low_level::emulate_default_handler(signal).unwrap();
                unreachable!();
            }
            for (_k, v) in actions2.lock().unwrap().drain() {
                v.lock().unwrap().run();
            }
        });
        Ok(SignalHandler { actions, next_id: 0 })
    }

    fn instance() -> MutexGuard<'static, Result<Self>> {
        lazy_static! {
            static ref INSTANCE: Mutex<Result<SignalHandler>> = Mutex::new(SignalHandler::new());
        }
        INSTANCE.lock().unwrap()
    }

    /// Creates a new `Actions`, adds it to the collection of those that will be invoked when the
    /// process terminates, and returns it along with an ID that may be used to remove it later.
    pub fn add_actions() -> Result<(u64, Arc<Mutex<Actions>>)> {
        match *Self::instance() {
            Err(ref e) => Err(anyhow!("{e}")),
            Ok(ref mut instance) => {
                let id = instance.next_id;
                instance.next_id += 1;
                let actions = Arc::new(Mutex::new(Actions::new()));
                instance.actions.lock().unwrap().insert(id, actions.clone());
                Ok((id, actions))
            }
        }
    }

    /// Removes the `Actions` with the given `id` from the collection (if any).  If `run` is true,
    /// runs the associated actions, otherwise skips them.
    pub fn remove_actions(id: u64, run: bool) {
        if let Ok(ref mut instance) = *Self::instance() {
            if let Some(actions) = instance.actions.lock().unwrap().remove(&id) {
                if run {
                    actions.lock().unwrap().run();
                }
            }
        }
    }
}

/// Release resources when dropped or due to a signal.
///
/// This struct supports deleting registered files (in practice, just the controller's own
/// pidfile) when the `Cleanup` is dropped or when the running process terminates due to a signal.
pub struct Cleanup {
    actions: Arc<Mutex<Actions>>,
    actions_id: u64
}

impl Cleanup {
    /// Creates and returns a new `Cleanup`, registering signal handlers.  When the `Cleanup` is
    /// dropped, or when the program is killed by a signal, it takes actions registered with it to
    /// clean up after resources registered with the object.
    ///
    /// Cleanup on signal handling happens in a thread that `Cleanup` creates.  This means that
    /// calling `fork` will prevent cleanup due to a signal from happening in the child process
    /// (but not cleanup due to drop).  Therefore, a process that forks should create a `Cleanup`
    /// only in the child, not in the parent.
    pub fn new() -> Result<Cleanup> {
        let (actions_id, actions) = SignalHandler::add_actions()?;
        Ok(Cleanup { actions, actions_id })
    }

    /// Registers `file` as a file to delete on exit.
    pub fn register_remove_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        self.actions.lock().unwrap().remove_files.insert(absolute_path(file.as_ref())?);
        Ok(())
    }
}

impl Drop for Cleanup {
    /// Deletes every file registered with `register_remove_file`.
    fn drop(&mut self) {
        SignalHandler::remove_actions(self.actions_id, true);
    }
}

// When std::path::absolute() becomes stable, we should use that instead.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(PathBuf::from(path))
    } else {
        let mut abspath = std::env::current_dir()?;
        abspath.extend(path);
        Ok(abspath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_passes_through_an_already_absolute_path() {
        let abs = absolute_path(Path::new("/tmp/ovncore.pid")).unwrap();
        assert_eq!(abs, PathBuf::from("/tmp/ovncore.pid"));
    }

    #[test]
    fn absolute_path_joins_a_relative_path_to_the_current_directory() {
        let relative = Path::new("ovncore.pid");
        let abs = absolute_path(relative).unwrap();
        assert!(abs.is_absolute());
        assert_eq!(abs.file_name().unwrap(), "ovncore.pid");
    }
}
