//! Optional statsd reporting for cache statistics.
//!
//! Reporting is process-global and off by default: nothing is recorded until
//! [`install_statsd`] installs a client, and every [`metric!`](crate::metric)
//! call short-circuits to a no-op while none is installed. Tags passed to the
//! installer are baked into the client, so individual emissions only carry
//! their own tags.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;

use cadence::{MetricError, StatsdClient, UdpMetricSink};

static CLIENT: OnceLock<StatsdClient> = OnceLock::new();

/// The traits needed to build and tag metrics.
pub mod prelude {
    pub use cadence::prelude::*;
}

/// Installs the process-wide statsd client the cache reports through.
///
/// `tags` are attached to every metric sent for the rest of the process
/// lifetime. Installing a client more than once leaves the first one in
/// place.
pub fn install_statsd<A: ToSocketAddrs>(
    prefix: &str,
    host: A,
    tags: &[(&str, &str)],
) -> Result<(), MetricError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(host, socket)?;

    let mut builder = StatsdClient::builder(prefix, sink);
    for (tag, value) in tags {
        builder = builder.with_tag(*tag, *value);
    }
    if CLIENT.set(builder.build()).is_ok() {
        tracing::debug!(prefix, "installed statsd metrics client");
    }
    Ok(())
}

/// The installed statsd client, if any. Prefer the
/// [`metric!`](crate::metric) macro over calling this directly.
#[inline(always)]
pub fn client() -> Option<&'static StatsdClient> {
    CLIENT.get()
}

/// Emits a metric through the installed client, or does nothing.
#[macro_export]
macro_rules! metric {
    // counters
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        if let Some(client) = $crate::metrics::client() {
            client.count_with_tags($id, $value)
                $(.with_tag($k, $v))*
                .send();
        }
    }};

    // gauges
    (gauge($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        if let Some(client) = $crate::metrics::client() {
            client.gauge_with_tags($id, $value)
                $(.with_tag($k, $v))*
                .send();
        }
    }};
}
