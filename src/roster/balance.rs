//! Squad balancing for individual matches.
//!
//! Players are split across the two sides bucket-by-bucket in a fixed
//! position priority: goalkeepers first, then defenders, midfielders,
//! forwards, and finally players with no declared position. Within a bucket
//! players keep their existing order and each goes to whichever side is
//! currently smaller, HOME on ties. The result balances each bucket to
//! within one player rather than chasing a global optimum. That is the
//! published contract, approximating one keeper per side and positional
//! symmetry.

use crate::models::{Position, RegistrationId, Side};

/// Bucket processing order. `None` is the unclassified bucket.
const BUCKET_ORDER: [Option<Position>; 5] = [
    Some(Position::Goalkeeper),
    Some(Position::Defender),
    Some(Position::Midfielder),
    Some(Position::Forward),
    None,
];

/// Plan side assignments for every registration, in processing order.
///
/// The caller resets all sides to NONE before applying the plan, so
/// retrying the whole operation is safe.
pub fn plan(players: &[(RegistrationId, Option<Position>)]) -> Vec<(RegistrationId, Side)> {
    let mut assignments = Vec::with_capacity(players.len());
    let mut home = 0usize;
    let mut away = 0usize;

    for bucket in BUCKET_ORDER {
        for (id, position) in players.iter().filter(|(_, p)| *p == bucket) {
            let side = if home <= away { Side::Home } else { Side::Away };
            match side {
                Side::Home => home += 1,
                Side::Away => away += 1,
                Side::None => unreachable!(),
            }
            assignments.push((id.clone(), side));
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn players(
        specs: &[(&str, Option<Position>)],
    ) -> Vec<(RegistrationId, Option<Position>)> {
        specs.iter().map(|(id, p)| ((*id).into(), *p)).collect()
    }

    fn side_of(plan: &[(RegistrationId, Side)], id: &str) -> Side {
        plan.iter()
            .find(|(p, _)| p.as_str() == id)
            .map(|(_, s)| *s)
            .unwrap()
    }

    #[test]
    fn test_two_keepers_split() {
        let plan = plan(&players(&[
            ("gk1", Some(Position::Goalkeeper)),
            ("gk2", Some(Position::Goalkeeper)),
        ]));

        assert_eq!(side_of(&plan, "gk1"), Side::Home);
        assert_eq!(side_of(&plan, "gk2"), Side::Away);
    }

    #[test]
    fn test_buckets_processed_in_priority_order() {
        // Listed out of order; the plan must still start with the keeper.
        let plan = plan(&players(&[
            ("fw", Some(Position::Forward)),
            ("df", Some(Position::Defender)),
            ("gk", Some(Position::Goalkeeper)),
            ("anon", None),
        ]));

        let order: Vec<&str> = plan.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["gk", "df", "fw", "anon"]);
    }

    #[test]
    fn test_ties_favor_home() {
        let plan = plan(&players(&[("a", None), ("b", None)]));
        assert_eq!(side_of(&plan, "a"), Side::Home);
        assert_eq!(side_of(&plan, "b"), Side::Away);
    }

    #[test]
    fn test_counts_carry_across_buckets() {
        // One keeper goes HOME; the first defender must then go AWAY.
        let plan = plan(&players(&[
            ("gk", Some(Position::Goalkeeper)),
            ("df1", Some(Position::Defender)),
            ("df2", Some(Position::Defender)),
        ]));

        assert_eq!(side_of(&plan, "gk"), Side::Home);
        assert_eq!(side_of(&plan, "df1"), Side::Away);
        assert_eq!(side_of(&plan, "df2"), Side::Home);
    }

    #[test]
    fn test_bucket_boundary_invariant() {
        // At the end of each bucket the side difference is at most one.
        let mixed = players(&[
            ("gk1", Some(Position::Goalkeeper)),
            ("df1", Some(Position::Defender)),
            ("df2", Some(Position::Defender)),
            ("df3", Some(Position::Defender)),
            ("mf1", Some(Position::Midfielder)),
            ("mf2", Some(Position::Midfielder)),
            ("fw1", Some(Position::Forward)),
            ("fw2", Some(Position::Forward)),
            ("fw3", Some(Position::Forward)),
            ("x1", None),
            ("x2", None),
        ]);
        let plan = plan(&mixed);

        let mut home = 0i32;
        let mut away = 0i32;
        let mut processed = 0usize;
        for bucket in BUCKET_ORDER {
            let in_bucket = mixed.iter().filter(|(_, p)| *p == bucket).count();
            for (_, side) in &plan[processed..processed + in_bucket] {
                match side {
                    Side::Home => home += 1,
                    Side::Away => away += 1,
                    Side::None => unreachable!(),
                }
            }
            processed += in_bucket;
            assert!((home - away).abs() <= 1);
        }
        assert_eq!(processed, plan.len());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let input = players(&[
            ("a", Some(Position::Forward)),
            ("b", None),
            ("c", Some(Position::Goalkeeper)),
        ]);
        assert_eq!(plan(&input), plan(&input));
    }

    #[test]
    fn test_empty_input() {
        assert!(plan(&[]).is_empty());
    }
}
