//! Results, statistics, and participation.
//!
//! Only verified votes are counted towards results. Candidates are ordered by vote
//! count, most first, with ties broken by candidate ID ascending; since ObjectIds
//! ascend with creation, that is candidate insertion order.

use std::collections::{BTreeMap, HashMap, HashSet};

use mongodb::{
    bson::{doc, Document},
    options::SessionOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::model::{
    api::results::{
        CandidateResult, ElectionResults, ElectionStatistics, Participation, TimelinePoint,
        VerificationStats,
    },
    common::granularity::Granularity,
    db::{
        candidate::Candidate, election::Election, election_event::ElectionEvent,
        invitation::Invitation, vote::Vote,
    },
    mongodb::{Coll, Id, MongoCollection},
};

/// Count verified votes per candidate. Every candidate appears, even with zero votes.
pub fn tally(candidates: &[Candidate], votes: &[Vote]) -> Vec<CandidateResult> {
    let mut counts: HashMap<Id, u64> = HashMap::new();
    for vote in votes.iter().filter(|v| v.is_verified) {
        *counts.entry(vote.candidate_id).or_default() += 1;
    }

    let mut results: Vec<(Id, CandidateResult)> = candidates
        .iter()
        .map(|candidate| {
            let result = CandidateResult {
                candidate_id: candidate.id.into(),
                candidate_name: candidate.full_name(),
                vote_count: counts.get(&candidate.id).copied().unwrap_or(0),
            };
            (candidate.id, result)
        })
        .collect();
    results.sort_by(|(a_id, a), (b_id, b)| {
        b.vote_count.cmp(&a.vote_count).then_with(|| a_id.cmp(b_id))
    });
    results.into_iter().map(|(_, result)| result).collect()
}

/// Bucket verified votes by creation time, ascending.
pub fn timeline(votes: &[Vote], granularity: Granularity) -> Vec<TimelinePoint> {
    let mut buckets = BTreeMap::new();
    for vote in votes.iter().filter(|v| v.is_verified) {
        *buckets
            .entry(granularity.truncate(vote.created_at))
            .or_insert(0) += 1;
    }
    buckets
        .into_iter()
        .map(|(bucket, vote_count)| TimelinePoint { bucket, vote_count })
        .collect()
}

pub fn verification_stats(votes: &[Vote]) -> VerificationStats {
    let verified_votes = votes.iter().filter(|v| v.is_verified).count() as u64;
    VerificationStats {
        verified_votes,
        unverified_votes: votes.len() as u64 - verified_votes,
    }
}

/// Percentage of invited voters who voted. Zero when nobody was invited.
pub fn participation_rate(unique_voters: u64, total_invited: u64) -> f64 {
    if total_invited == 0 {
        0.0
    } else {
        unique_voters as f64 / total_invited as f64 * 100.0
    }
}

/// Results for one election.
pub async fn election_results(
    db_client: &Client,
    db: &Database,
    election: &Election,
) -> Result<ElectionResults> {
    let mut session = snapshot_session(db_client).await?;
    let (candidates, votes) = candidates_and_votes(db, &mut session, &[election.id]).await?;

    let results = tally(&candidates, &votes);
    Ok(ElectionResults {
        election_id: election.id.into(),
        election_title: election.title.clone(),
        total_votes: results.iter().map(|r| r.vote_count).sum(),
        results,
    })
}

/// Detailed statistics for one election.
pub async fn election_statistics(
    db_client: &Client,
    db: &Database,
    election: &Election,
    granularity: Granularity,
) -> Result<ElectionStatistics> {
    let mut session = snapshot_session(db_client).await?;
    let (candidates, votes) = candidates_and_votes(db, &mut session, &[election.id]).await?;

    Ok(ElectionStatistics {
        election_id: election.id.into(),
        election_title: election.title.clone(),
        total_votes: votes.len() as u64,
        candidate_results: tally(&candidates, &votes),
        voting_timeline: timeline(&votes, granularity),
        verification_stats: verification_stats(&votes),
    })
}

/// Turnout across every election of an event.
pub async fn event_participation(
    db_client: &Client,
    db: &Database,
    event: &ElectionEvent,
) -> Result<Participation> {
    let mut session = snapshot_session(db_client).await?;

    let used_invitations = doc! {
        "election_event_id": event.id,
        "is_used": true,
    };
    let total_invited_voters = Coll::<Invitation>::from_db(db)
        .count_documents_with_session(used_invitations, None, &mut session)
        .await?;

    let elections: Vec<Election> =
        find_all(db, &mut session, doc! { "election_event_id": event.id }).await?;
    let election_ids: Vec<Id> = elections.iter().map(|e| e.id).collect();
    let (candidates, votes) = candidates_and_votes(db, &mut session, &election_ids).await?;

    // Join each vote to its election through its candidate.
    let election_of: HashMap<Id, Id> = candidates
        .iter()
        .map(|c| (c.id, c.election_id))
        .collect();
    let mut verified_per_election: HashMap<Id, u64> = HashMap::new();
    for vote in votes.iter().filter(|v| v.is_verified) {
        if let Some(election_id) = election_of.get(&vote.candidate_id) {
            *verified_per_election.entry(*election_id).or_default() += 1;
        }
    }
    let mut votes_per_election = BTreeMap::new();
    for election in &elections {
        let count = verified_per_election.get(&election.id).copied().unwrap_or(0);
        *votes_per_election.entry(election.title.clone()).or_insert(0) += count;
    }

    let unique_voters_participated =
        votes.iter().map(|v| v.voter_id).collect::<HashSet<_>>().len() as u64;
    let total_votes_cast = votes_per_election.values().sum();

    Ok(Participation {
        election_event_id: event.id.into(),
        total_invited_voters,
        unique_voters_participated,
        participation_rate: participation_rate(unique_voters_participated, total_invited_voters),
        votes_per_election,
        total_votes_cast,
    })
}

async fn snapshot_session(db_client: &Client) -> Result<ClientSession> {
    let options = SessionOptions::builder().snapshot(true).build();
    Ok(db_client.start_session(Some(options)).await?)
}

/// The candidates of the given elections, and every vote cast for them.
async fn candidates_and_votes(
    db: &Database,
    session: &mut ClientSession,
    election_ids: &[Id],
) -> Result<(Vec<Candidate>, Vec<Vote>)> {
    let candidates: Vec<Candidate> = find_all(
        db,
        session,
        doc! { "election_id": { "$in": election_ids.to_vec() } },
    )
    .await?;
    let candidate_ids: Vec<Id> = candidates.iter().map(|c| c.id).collect();
    let votes: Vec<Vote> = find_all(
        db,
        session,
        doc! { "candidate_id": { "$in": candidate_ids } },
    )
    .await?;
    Ok((candidates, votes))
}

async fn find_all<T>(db: &Database, session: &mut ClientSession, filter: Document) -> Result<Vec<T>>
where
    T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
{
    let mut cursor = Coll::<T>::from_db(db)
        .find_with_session(filter, None, session)
        .await?;
    Ok(cursor.stream(session).try_collect().await?)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn votes_for(candidate: &Candidate, n: usize) -> Vec<Vote> {
        (0..n).map(|_| Vote::new(Id::new(), candidate)).collect()
    }

    #[test]
    fn tally_counts_and_orders_candidates() {
        let election = Id::new();
        let a = Candidate::example(election, "Alice", "A");
        let b = Candidate::example(election, "Bob", "B");
        let c = Candidate::example(election, "Carol", "C");
        let mut votes = votes_for(&a, 3);
        votes.extend(votes_for(&b, 5));

        let results = tally(&[a.clone(), b.clone(), c.clone()], &votes);
        let counts: Vec<(String, u64)> = results
            .iter()
            .map(|r| (r.candidate_name.clone(), r.vote_count))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("Bob B".to_string(), 5),
                ("Alice A".to_string(), 3),
                ("Carol C".to_string(), 0),
            ]
        );
        assert_eq!(results.iter().map(|r| r.vote_count).sum::<u64>(), 8);
    }

    #[test]
    fn tally_excludes_unverified_votes() {
        let election = Id::new();
        let a = Candidate::example(election, "Alice", "A");
        let mut votes = votes_for(&a, 2);
        votes[0].vote.is_verified = false;

        let results = tally(&[a], &votes);
        assert_eq!(results[0].vote_count, 1);
        assert_eq!(
            verification_stats(&votes),
            VerificationStats {
                verified_votes: 1,
                unverified_votes: 1
            }
        );
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let election = Id::new();
        let first = Candidate::example(election, "First", "X");
        let second = Candidate::example(election, "Second", "X");
        let mut votes = votes_for(&second, 1);
        votes.extend(votes_for(&first, 1));

        // Input order must not matter.
        let results = tally(&[second.clone(), first.clone()], &votes);
        assert_eq!(*results[0].candidate_id, first.id);
        assert_eq!(*results[1].candidate_id, second.id);
    }

    #[test]
    fn participation_rate_handles_zero_invitations() {
        assert_eq!(participation_rate(4, 10), 40.0);
        assert_eq!(participation_rate(0, 0), 0.0);
        assert_eq!(participation_rate(3, 0), 0.0);
    }

    #[test]
    fn timeline_buckets_ascending() {
        let candidate = Candidate::example(Id::new(), "Alice", "A");
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        let voter = Id::new();
        let votes = vec![
            Vote::new_at(voter, &candidate, base + Duration::hours(2)),
            Vote::new_at(voter, &candidate, base),
            Vote::new_at(voter, &candidate, base + Duration::minutes(30)),
        ];

        let hourly = timeline(&votes, Granularity::Hour);
        assert_eq!(
            hourly,
            vec![
                TimelinePoint {
                    bucket: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                    vote_count: 2
                },
                TimelinePoint {
                    bucket: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
                    vote_count: 1
                },
            ]
        );

        let daily = timeline(&votes, Granularity::Day);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].vote_count, 3);
    }
}
