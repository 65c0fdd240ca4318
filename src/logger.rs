//! Connection diagnostics written through the `log` facade.

use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::stats::StatsReportType;

use crate::peer::IceCandidate;

/// Trickle-ICE candidate as soon as it shows up
pub fn dump_candidate(label: &str, cand: &RTCIceCandidate) {
    if let Ok(init) = cand.to_json() {
        log::debug!(
            "trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
            init.candidate,
            init.sdp_mid,
            init.sdp_mline_index,
            init.username_fragment
        );
    }
}

/// getStats snapshot of the nominated candidate pair
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, report) in stats.reports {
        if let StatsReportType::CandidatePair(pair) = report {
            if pair.nominated {
                log::info!(
                    "stats {moment}: {}:{} type={:?} bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

/// Counts gathered candidates by type, warning when no relay is available
pub fn analyze_candidates(candidates: &[IceCandidate]) -> CandidateSummary {
    let mut summary = CandidateSummary::default();
    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            summary.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            summary.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            summary.relay += 1;
        }
    }

    log::info!(
        "candidate analysis: {} host, {} srflx, {} relay",
        summary.host,
        summary.srflx,
        summary.relay
    );
    if summary.relay == 0 {
        log::warn!("no TURN relay candidates gathered, connection through NAT may fail");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(line: &str) -> IceCandidate {
        IceCandidate {
            candidate: line.to_owned(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    #[test]
    fn counts_by_candidate_type() {
        let summary = analyze_candidates(&[
            cand("candidate:1 1 udp 2130706431 192.168.1.2 5000 typ host"),
            cand("candidate:2 1 udp 1694498815 203.0.113.7 5001 typ srflx raddr 192.168.1.2 rport 5000"),
            cand("candidate:3 1 udp 16777215 198.51.100.1 3478 typ relay raddr 203.0.113.7 rport 5001"),
            cand("candidate:4 1 udp 2130706431 10.0.0.2 5002 typ host"),
        ]);
        assert_eq!(
            summary,
            CandidateSummary {
                host: 2,
                srflx: 1,
                relay: 1
            }
        );
    }
}
