//! Console annotation listener.
//!
//! Runs beside the sampling loop and turns operator input lines into
//! timestamped markers on the session clock: the mark token records a
//! MARK marker, the set token records a SET marker, and an empty line
//! requests a stop of the whole session. Unrecognized input is ignored.
//!
//! The listener is generic over its input so tests can drive it from an
//! in-memory buffer; production wires it to stdin.

use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::acquisition::state::RunState;
use crate::core::{Marker, MarkerKind, SessionClock};

/// Console token that records a MARK marker.
pub const MARK_TOKEN: &str = "m";
/// Console token that records a SET marker.
pub const SET_TOKEN: &str = "n";

/// Read input lines until the stop flag is set, input ends, or an empty
/// line requests a stop.
///
/// End of input only ends the listener; the sampling loop keeps running
/// until its duration ceiling.
pub async fn listen<R>(mut input: R, clock: SessionClock, state: Arc<RunState>)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    while !state.is_stopped() {
        line.clear();
        match input.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let elapsed_s = clock.elapsed_s();
                match line.trim().to_lowercase().as_str() {
                    MARK_TOKEN => {
                        state.record_marker(Marker {
                            kind: MarkerKind::Mark,
                            elapsed_s,
                        });
                        info!("marker (m) added at {elapsed_s:.2} s");
                    }
                    SET_TOKEN => {
                        state.record_marker(Marker {
                            kind: MarkerKind::Set,
                            elapsed_s,
                        });
                        info!("set point (n) added at {elapsed_s:.2} s");
                    }
                    "" => {
                        state.request_stop();
                        info!("stopping early");
                        break;
                    }
                    _ => {}
                }
            }
            Err(error) => {
                warn!("console read error: {error}");
                break;
            }
        }
    }
}
