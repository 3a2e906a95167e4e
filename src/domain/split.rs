use super::{Cents, ParticipantId};

/// One transfer proposed by the simplification walk, before it is attached
/// to a group and persisted as a [`super::Settlement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEdge {
    pub payer_id: ParticipantId,
    pub payee_id: ParticipantId,
    pub amount_cents: Cents,
}

/// The amount each participant should have paid for an even split, rounded
/// half-up to the nearest cent. All other settlement arithmetic is exact
/// integer cents, so this rounding is the only source of residual imbalance
/// (at most half a cent per participant).
pub fn fair_share(total_cents: Cents, participant_count: i64) -> Cents {
    assert!(participant_count > 0, "fair share needs at least one participant");
    let quotient = total_cents / participant_count;
    let remainder = total_cents % participant_count;
    if remainder * 2 >= participant_count {
        quotient + 1
    } else {
        quotient
    }
}

/// A participant's net position: what they paid minus their fair share.
/// Positive means the group owes them, negative means they owe the group.
pub fn net_position(amount_cents: Cents, share: Cents) -> Cents {
    amount_cents - share
}

/// Reduce a group's contributions to a minimal list of direct transfers
/// that settles every participant's net position.
///
/// Contributions are partitioned into creditors (paid at least the fair
/// share) and debtors (paid less), preserving encounter order within each
/// partition; ties are broken purely by input order, never by magnitude.
/// Two cursors then walk the partitions: whichever of the current pair has
/// already reached the fair share is advanced, otherwise the largest
/// payment both sides can absorb is emitted and applied to their running
/// balances. Each emitted edge settles at least one side, so every
/// participant appears as payer at most once per creditor and the walk
/// terminates when either partition is exhausted.
///
/// An empty contribution list yields an empty transfer list; callers guard
/// against zero participants before asking for a fair share.
pub fn simplify(
    total_cents: Cents,
    contributions: &[(ParticipantId, Cents)],
) -> Vec<SettlementEdge> {
    if contributions.is_empty() {
        return Vec::new();
    }
    let share = fair_share(total_cents, contributions.len() as i64);

    let mut creditors: Vec<(&ParticipantId, Cents)> = Vec::new();
    let mut debtors: Vec<(&ParticipantId, Cents)> = Vec::new();
    for (participant_id, amount_cents) in contributions {
        if *amount_cents >= share {
            creditors.push((participant_id, *amount_cents));
        } else {
            debtors.push((participant_id, *amount_cents));
        }
    }

    let mut edges = Vec::new();
    let mut creditor_idx = 0;
    let mut debtor_idx = 0;
    while debtor_idx < debtors.len() && creditor_idx < creditors.len() {
        if creditors[creditor_idx].1 == share {
            creditor_idx += 1;
            continue;
        }
        if debtors[debtor_idx].1 == share {
            debtor_idx += 1;
            continue;
        }
        let payment = Cents::min(
            share - debtors[debtor_idx].1,
            creditors[creditor_idx].1 - share,
        );
        debtors[debtor_idx].1 += payment;
        creditors[creditor_idx].1 -= payment;
        edges.push(SettlementEdge {
            payer_id: debtors[debtor_idx].0.clone(),
            payee_id: creditors[creditor_idx].0.clone(),
            amount_cents: payment,
        });
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributions(entries: &[(&str, Cents)]) -> Vec<(ParticipantId, Cents)> {
        entries
            .iter()
            .map(|(id, amount)| (id.to_string(), *amount))
            .collect()
    }

    /// Sum of edges credited to / debited from each participant must match
    /// their net position, up to the fair-share rounding tolerance.
    fn assert_conservation(total: Cents, input: &[(ParticipantId, Cents)]) {
        let edges = simplify(total, input);
        let share = fair_share(total, input.len() as i64);
        for (participant, amount) in input {
            let settled: Cents = edges
                .iter()
                .map(|e| {
                    if e.payee_id == *participant {
                        -e.amount_cents
                    } else if e.payer_id == *participant {
                        e.amount_cents
                    } else {
                        0
                    }
                })
                .sum();
            let residual = (net_position(*amount, share) + settled).abs();
            assert!(
                residual <= 1,
                "participant {} left with residual {} cents",
                participant,
                residual
            );
        }
    }

    #[test]
    fn test_fair_share_exact() {
        assert_eq!(fair_share(30000, 3), 10000);
        assert_eq!(fair_share(10000, 4), 2500);
    }

    #[test]
    fn test_fair_share_rounds_half_up() {
        assert_eq!(fair_share(10000, 3), 3333); // 33.333... -> 33.33
        assert_eq!(fair_share(100, 3), 33);
        assert_eq!(fair_share(50, 4), 13); // 12.5 -> 13
        assert_eq!(fair_share(0, 5), 0);
    }

    #[test]
    fn test_empty_input_yields_no_edges() {
        assert!(simplify(0, &[]).is_empty());
    }

    #[test]
    fn test_three_way_split_single_transfer() {
        // 100 + 50 + 150 = 300, fair share 100: the even contributor is
        // omitted entirely, the underpayer owes the overpayer 50.00
        let input = contributions(&[("alice", 10000), ("bob", 5000), ("carol", 15000)]);
        let edges = simplify(30000, &input);

        assert_eq!(
            edges,
            vec![SettlementEdge {
                payer_id: "bob".into(),
                payee_id: "carol".into(),
                amount_cents: 5000,
            }]
        );
        assert_conservation(30000, &input);
    }

    #[test]
    fn test_single_payer_covers_everyone() {
        // 0 + 0 + 0 + 100 = 100, fair share 25: three debtors each owe the
        // sole creditor 25.00
        let input =
            contributions(&[("a", 0), ("b", 0), ("c", 0), ("d", 10000)]);
        let edges = simplify(10000, &input);

        assert_eq!(edges.len(), 3);
        for (edge, payer) in edges.iter().zip(["a", "b", "c"]) {
            assert_eq!(edge.payer_id, payer);
            assert_eq!(edge.payee_id, "d");
            assert_eq!(edge.amount_cents, 2500);
        }
        assert_conservation(10000, &input);
    }

    #[test]
    fn test_exact_share_contributor_never_named() {
        let input = contributions(&[("even", 10000), ("low", 5000), ("high", 15000)]);
        let edges = simplify(30000, &input);

        assert!(
            edges
                .iter()
                .all(|e| e.payer_id != "even" && e.payee_id != "even"),
            "a contribution equal to the fair share must produce no transfer"
        );
    }

    #[test]
    fn test_all_equal_contributions_settle_with_no_edges() {
        let input = contributions(&[("a", 2500), ("b", 2500), ("c", 2500), ("d", 2500)]);
        assert!(simplify(10000, &input).is_empty());
    }

    #[test]
    fn test_single_participant_is_trivially_settled() {
        let input = contributions(&[("solo", 4200)]);
        assert!(simplify(4200, &input).is_empty());
    }

    #[test]
    fn test_debtor_spans_multiple_creditors() {
        // fair share 50: "low" owes 40 split across both overpayers
        let input = contributions(&[("high1", 7000), ("low", 1000), ("high2", 7000)]);
        let edges = simplify(15000, &input);

        assert_eq!(
            edges,
            vec![
                SettlementEdge {
                    payer_id: "low".into(),
                    payee_id: "high1".into(),
                    amount_cents: 2000,
                },
                SettlementEdge {
                    payer_id: "low".into(),
                    payee_id: "high2".into(),
                    amount_cents: 2000,
                },
            ]
        );
        assert_conservation(15000, &input);
    }

    #[test]
    fn test_uneven_total_leaves_only_rounding_residual() {
        // 100.00 across 3: fair share 33.33, one cent is unaccounted for by
        // design and stays with the creditor
        let input = contributions(&[("payer", 10000), ("x", 0), ("y", 0)]);
        let edges = simplify(10000, &input);

        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.amount_cents == 3333));
        assert_conservation(10000, &input);
    }

    #[test]
    fn test_amounts_are_always_positive() {
        let input = contributions(&[
            ("a", 100),
            ("b", 0),
            ("c", 9900),
            ("d", 5000),
            ("e", 5000),
        ]);
        let edges = simplify(20000, &input);
        assert!(edges.iter().all(|e| e.amount_cents > 0));
        assert_conservation(20000, &input);
    }

    #[test]
    fn test_simplify_is_deterministic() {
        let input = contributions(&[
            ("a", 1234),
            ("b", 8766),
            ("c", 0),
            ("d", 4321),
            ("e", 5679),
        ]);
        let first = simplify(20000, &input);
        let second = simplify(20000, &input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tie_break_is_encounter_order() {
        // Two identical debtors: the one listed first pays first
        let input = contributions(&[("first", 0), ("second", 0), ("rich", 6000)]);
        let edges = simplify(6000, &input);

        assert_eq!(edges[0].payer_id, "first");
        assert_eq!(edges[1].payer_id, "second");
    }
}
