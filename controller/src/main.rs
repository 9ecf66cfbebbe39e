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

//! `ovn-flow-agent` drives a single bridge's flow table to match whatever desired state has been
//! fed into it, over that bridge's local OpenFlow management socket.

use std::io::stderr;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use daemon::Daemonize;
use tracing::{event, Level};

use reconcile::driver::Driver;
use reconcile::interfaces::{MeterCatalog, MeterSpec};

mod codec;
mod rconn;

/// A [`MeterCatalog`] stand-in with no named meters. A real deployment resolves these against
/// the OVSDB `Meter` table instead; that lookup is out of scope here.
struct EmptyCatalog;

impl MeterCatalog for EmptyCatalog {
    fn lookup(&self, _name: &str) -> Option<MeterSpec> {
        None
    }
}

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Bridge to manage, e.g. "br-int".
    bridge: String,

    /// Directory holding the bridge's management socket.
    #[clap(long, default_value = "/var/run/openvswitch")]
    rundir: PathBuf,

    /// Echo-request interval used to detect a wedged connection, in milliseconds.
    #[clap(long, default_value = "5000")]
    inactivity_probe: u64,

    #[clap(flatten)]
    daemonize: Daemonize,

    /// File to write logs to. Defaults to stderr.
    #[clap(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let Args { bridge, rundir, inactivity_probe, daemonize, log_file } = Args::parse();

    if let Some(log_file) = log_file {
        let writer = OpenOptions::new().create(true).append(true).open(log_file)?;
        tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(stderr)
            .with_ansi(unsafe { libc::isatty(libc::STDERR_FILENO) } == 1)
            .init();
    }

    let (daemonizing, _cleanup) = unsafe { daemonize.start() };
    let mut daemonizing = Some(daemonizing);

    let rundir = rundir.to_string_lossy().into_owned();
    let mut transport = rconn::UnixRconn::new(Box::new(codec::BasicCodec::new()));
    let meters = EmptyCatalog;
    let mut driver = Driver::new();
    let idle_interval = Duration::from_millis(inactivity_probe);

    // nb_cfg tracking is driven externally (by whatever feeds desired state into this agent);
    // a standalone binary with no such feed has nothing to advance it with, so it stays fixed.
    let incoming_nb_cfg = 0;

    event!(Level::INFO, bridge = bridge.as_str(), rundir = rundir.as_str(), "starting");

    loop {
        driver.run(&rundir, &bridge, &mut transport, &meters, incoming_nb_cfg);

        if daemonizing.is_some() && transport_is_settled(&transport) {
            if let Some(d) = daemonizing.take() {
                d.finish();
            }
        }

        if !driver.wants_immediate_rerun() {
            sleep(idle_interval);
        }
    }
}

/// True once the agent has completed at least one full negotiation with the switch: the signal
/// the parent process waits for before it can safely exit (see the `Daemonize` module doc).
fn transport_is_settled(transport: &rconn::UnixRconn) -> bool {
    ovs::Transport::is_connected(transport)
}
