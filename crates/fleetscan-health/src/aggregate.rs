//! Cluster aggregation — fold verdicts into per-cluster endpoint lists.
//!
//! Pure: the same membership and verdicts always produce the same
//! [`Aggregation`]. The human-readable report lines are returned alongside
//! the report instead of being written anywhere.

use std::collections::HashMap;
use std::fmt;

use fleetscan_core::{
    ClusterId, ClusterReport, EndpointUrl, FailureReason, Membership, Verdict, WorkerId,
};

/// One line of the human-readable scan report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// Header introducing a cluster's members.
    Cluster { cluster: ClusterId, members: usize },
    Healthy {
        worker: WorkerId,
        endpoint: EndpointUrl,
    },
    Unhealthy {
        worker: WorkerId,
        endpoint: EndpointUrl,
        reason: FailureReason,
    },
    /// The worker has no registered endpoint.
    NotFound { worker: WorkerId },
}

impl ReportLine {
    pub fn symbol(&self) -> &'static str {
        match self {
            ReportLine::Cluster { .. } => "▸",
            ReportLine::Healthy { .. } => "✅",
            ReportLine::Unhealthy { .. } => "❌",
            ReportLine::NotFound { .. } => "❓",
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.symbol();
        match self {
            ReportLine::Cluster { cluster, members } => {
                write!(f, "{symbol} cluster {cluster} ({members} workers)")
            }
            ReportLine::Healthy { worker, endpoint } => {
                write!(f, "  {symbol} {worker} {endpoint}")
            }
            ReportLine::Unhealthy {
                worker,
                endpoint,
                reason,
            } => write!(f, "  {symbol} {worker} {endpoint}: {reason}"),
            ReportLine::NotFound { worker } => {
                write!(f, "  {symbol} {worker}: worker not found")
            }
        }
    }
}

/// Per-member outcome counts for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanTally {
    pub healthy: usize,
    pub unhealthy: usize,
    pub not_found: usize,
}

impl ScanTally {
    pub fn members(&self) -> usize {
        self.healthy + self.unhealthy + self.not_found
    }

    /// Whether any member lacks a healthy endpoint.
    pub fn has_failures(&self) -> bool {
        self.unhealthy > 0 || self.not_found > 0
    }
}

impl fmt::Display for ScanTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} healthy, {} unhealthy, {} not found",
            self.healthy, self.unhealthy, self.not_found
        )
    }
}

/// Result of aggregating one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub report: ClusterReport,
    pub lines: Vec<ReportLine>,
    pub tally: ScanTally,
}

/// Join verdicts against cluster membership.
///
/// Every cluster in `membership` is present in the report, possibly with
/// no endpoints. Healthy endpoints keep the order of the membership list.
/// If a worker somehow has several verdicts, the first one is used.
pub fn aggregate(membership: &Membership, verdicts: &[Verdict]) -> Aggregation {
    let mut by_worker: HashMap<&WorkerId, &Verdict> = HashMap::with_capacity(verdicts.len());
    for verdict in verdicts {
        by_worker.entry(&verdict.worker).or_insert(verdict);
    }

    let mut report = ClusterReport::new();
    let mut lines = Vec::new();
    let mut tally = ScanTally::default();

    for (cluster, members) in membership {
        report.add_cluster(cluster.clone());
        lines.push(ReportLine::Cluster {
            cluster: cluster.clone(),
            members: members.len(),
        });

        for worker in members {
            let Some(verdict) = by_worker.get(worker) else {
                tally.not_found += 1;
                lines.push(ReportLine::NotFound {
                    worker: worker.clone(),
                });
                continue;
            };

            match &verdict.reason {
                None => {
                    tally.healthy += 1;
                    report.push_endpoint(cluster, verdict.endpoint.clone());
                    lines.push(ReportLine::Healthy {
                        worker: worker.clone(),
                        endpoint: verdict.endpoint.clone(),
                    });
                }
                Some(reason) => {
                    tally.unhealthy += 1;
                    lines.push(ReportLine::Unhealthy {
                        worker: worker.clone(),
                        endpoint: verdict.endpoint.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
    }

    Aggregation {
        report,
        lines,
        tally,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use fleetscan_core::ProbeTarget;

    fn cluster(s: &str) -> ClusterId {
        ClusterId::new(s).unwrap()
    }

    fn healthy(n: u8, endpoint: &str) -> Verdict {
        Verdict::healthy(&target(n, endpoint))
    }

    fn unhealthy(n: u8, endpoint: &str, reason: FailureReason) -> Verdict {
        Verdict::unhealthy(&ProbeTarget::new(worker(n), url(endpoint)), reason)
    }

    #[test]
    fn mismatch_scenario() {
        let membership = Membership::from([(cluster("C1"), vec![worker(1), worker(2)])]);
        let verdicts = vec![
            unhealthy(
                2,
                "http://u2",
                FailureReason::IdentityMismatch { reported: worker(1) },
            ),
            healthy(1, "http://u1"),
        ];

        let agg = aggregate(&membership, &verdicts);
        assert_eq!(agg.report.endpoints(&cluster("C1")), Some(&[url("http://u1")][..]));
        assert_eq!(
            agg.tally,
            ScanTally {
                healthy: 1,
                unhealthy: 1,
                not_found: 0
            }
        );
        assert_eq!(
            agg.lines[2].to_string(),
            "  ❌ 0xaa02 http://u2: reported identity does not match registered identity"
        );
    }

    #[test]
    fn missing_registration_is_not_found() {
        let membership = Membership::from([(cluster("C1"), vec![worker(3)])]);
        let agg = aggregate(&membership, &[]);

        assert_eq!(agg.report.endpoints(&cluster("C1")), Some(&[][..]));
        assert_eq!(agg.tally.not_found, 1);
        assert_eq!(agg.lines.len(), 2);
        assert_eq!(agg.lines[1], ReportLine::NotFound { worker: worker(3) });
        assert!(agg.lines[1].to_string().contains("not found"));
    }

    #[test]
    fn every_member_gets_exactly_one_outcome() {
        let membership = Membership::from([
            (cluster("a"), vec![worker(1), worker(2), worker(3)]),
            (cluster("b"), vec![worker(4)]),
            (cluster("c"), vec![]),
        ]);
        let verdicts = vec![
            healthy(1, "http://u1"),
            unhealthy(2, "http://u2", FailureReason::Timeout),
            healthy(4, "http://u4"),
            // Worker 9 is registered but belongs to no cluster.
            healthy(9, "http://u9"),
        ];

        let agg = aggregate(&membership, &verdicts);
        assert_eq!(agg.tally.members(), 4);
        assert!(agg.tally.has_failures());

        let member_lines = agg
            .lines
            .iter()
            .filter(|l| !matches!(l, ReportLine::Cluster { .. }))
            .count();
        assert_eq!(member_lines, 4);
        assert_eq!(agg.report.cluster_count(), 3);
        assert_eq!(agg.report.endpoints(&cluster("c")), Some(&[][..]));
        assert_eq!(agg.report.endpoint_count(), 2);
    }

    #[test]
    fn preserves_membership_order_not_verdict_order() {
        let membership =
            Membership::from([(cluster("C1"), vec![worker(3), worker(1), worker(2)])]);
        let verdicts = vec![
            healthy(1, "http://u1"),
            healthy(2, "http://u2"),
            healthy(3, "http://u3"),
        ];

        let agg = aggregate(&membership, &verdicts);
        assert_eq!(
            agg.report.endpoints(&cluster("C1")).unwrap(),
            &[url("http://u3"), url("http://u1"), url("http://u2")]
        );
    }

    #[test]
    fn unhealthy_endpoints_never_reported() {
        let membership = Membership::from([(cluster("C1"), vec![worker(1), worker(2)])]);
        let verdicts = vec![
            unhealthy(1, "http://u1", FailureReason::Lagging { by: 20 }),
            unhealthy(2, "http://u2", FailureReason::Transport("boom".into())),
        ];
        let agg = aggregate(&membership, &verdicts);
        assert_eq!(agg.report.endpoint_count(), 0);
        assert_eq!(agg.tally.unhealthy, 2);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let membership = Membership::from([
            (cluster("a"), vec![worker(1), worker(2)]),
            (cluster("b"), vec![worker(3)]),
        ]);
        let verdicts = vec![
            healthy(2, "http://u2"),
            unhealthy(1, "http://u1", FailureReason::Timeout),
        ];
        assert_eq!(
            aggregate(&membership, &verdicts),
            aggregate(&membership, &verdicts)
        );
    }

    #[test]
    fn duplicate_verdicts_use_first() {
        let membership = Membership::from([(cluster("a"), vec![worker(1)])]);
        let verdicts = vec![
            healthy(1, "http://first"),
            unhealthy(1, "http://second", FailureReason::Timeout),
        ];
        let agg = aggregate(&membership, &verdicts);
        assert_eq!(agg.report.endpoints(&cluster("a")), Some(&[url("http://first")][..]));
        assert_eq!(agg.tally.members(), 1);
    }

    #[test]
    fn line_formats() {
        let header = ReportLine::Cluster {
            cluster: cluster("c1"),
            members: 2,
        };
        assert_eq!(header.to_string(), "▸ cluster c1 (2 workers)");
        let ok = ReportLine::Healthy {
            worker: worker(1),
            endpoint: url("http://u1"),
        };
        assert_eq!(ok.to_string(), "  ✅ 0xaa01 http://u1");
        assert_eq!(
            ScanTally {
                healthy: 3,
                unhealthy: 1,
                not_found: 2
            }
            .to_string(),
            "3 healthy, 1 unhealthy, 2 not found"
        );
    }
}
