use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::enums::{DealOutcome, LeadSource, Role};
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::models::{Deal, Team, User};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::parse_id;
use crate::core::store::{CrmStore, Filter, OwnerScope};
use crate::security::{ensure_admin, Actor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub total_deals: u64,
    pub won_deals: u64,
    pub lost_deals: u64,
    pub open_deals: u64,
    pub total_value: f64,
    pub won_value: f64,
    pub open_value: f64,
}

/// Won and lost are terminal; every other stage counts as open.
pub fn calculate_deal_stats(deals: &[Deal]) -> DealStats {
    let mut stats = DealStats::default();
    for deal in deals {
        let value = if deal.value.is_finite() { deal.value } else { 0.0 };
        stats.total_deals += 1;
        stats.total_value += value;
        match deal.stage.outcome() {
            DealOutcome::Won => {
                stats.won_deals += 1;
                stats.won_value += value;
            }
            DealOutcome::Lost => stats.lost_deals += 1,
            DealOutcome::Open => {
                stats.open_deals += 1;
                stats.open_value += value;
            }
        }
    }
    stats
}

pub async fn stats_for(store: &dyn CrmStore, scope: OwnerScope) -> CrmResult<DealStats> {
    let deals = store.deals().find_many(&Filter::scoped(Some(scope))).await?;
    Ok(calculate_deal_stats(&deals))
}

#[derive(Debug, Serialize)]
pub struct ActorSummary {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct MyPerformance {
    pub user: ActorSummary,
    pub stats: DealStats,
}

#[derive(Debug, Serialize)]
pub struct UserPerformance {
    pub user: User,
    pub stats: DealStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPerformance {
    pub team_id: Uuid,
    pub team_name: String,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<MemberSummary>>,
    pub stats: DealStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadSourceCount {
    pub source: LeadSource,
    pub count: i64,
}

pub async fn team_stats(store: &dyn CrmStore, team: &Team) -> CrmResult<TeamPerformance> {
    let stats = stats_for(store, OwnerScope::AnyOf(team.members.clone())).await?;
    Ok(TeamPerformance {
        team_id: team.id,
        team_name: team.name.clone(),
        member_count: team.members.len(),
        members: None,
        stats,
    })
}

/// Count descending, ties by source name.
pub async fn lead_source_summary(store: &dyn CrmStore) -> CrmResult<Vec<LeadSourceCount>> {
    let mut summary: Vec<LeadSourceCount> = store
        .lead_source_counts()
        .await?
        .into_iter()
        .map(|(source, count)| LeadSourceCount { source, count })
        .collect();
    summary.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.source.as_str().cmp(b.source.as_str()))
    });
    Ok(summary)
}

pub async fn my_performance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<MyPerformance>> {
    let stats = stats_for(state.store.as_ref(), OwnerScope::One(actor.user_id)).await?;
    Ok(Json(MyPerformance {
        user: ActorSummary {
            id: actor.user_id,
            role: actor.role,
        },
        stats,
    }))
}

pub async fn user_performance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(user_id): Path<String>,
) -> CrmResult<Json<UserPerformance>> {
    ensure_admin(&actor)?;
    let user_id = parse_id(&user_id, "user id")?;
    let user = state
        .store
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| CrmError::not_found("User not found"))?;
    let stats = stats_for(state.store.as_ref(), OwnerScope::One(user.id)).await?;
    Ok(Json(UserPerformance { user, stats }))
}

pub async fn all_team_performance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<TeamPerformance>>> {
    ensure_admin(&actor)?;
    let mut teams = state.store.teams().find_many(&Filter::all()).await?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));

    let mut results = Vec::with_capacity(teams.len());
    for team in &teams {
        results.push(team_stats(state.store.as_ref(), team).await?);
    }
    Ok(Json(results))
}

pub async fn single_team_performance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(team_id): Path<String>,
) -> CrmResult<Json<TeamPerformance>> {
    ensure_admin(&actor)?;
    let team_id = parse_id(&team_id, "team id")?;
    let team = state
        .store
        .teams()
        .find_by_id(team_id)
        .await?
        .ok_or_else(|| CrmError::not_found("Team not found"))?;

    let mut members = Vec::with_capacity(team.members.len());
    for member_id in &team.members {
        if let Some(user) = state.store.users().find_by_id(*member_id).await? {
            members.push(MemberSummary {
                id: user.id,
                name: user.name,
                email: user.email,
            });
        }
    }

    let mut performance = team_stats(state.store.as_ref(), &team).await?;
    performance.members = Some(members);
    Ok(Json(performance))
}

pub async fn lead_source_report(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> CrmResult<Json<Vec<LeadSourceCount>>> {
    ensure_admin(&actor)?;
    Ok(Json(lead_source_summary(state.store.as_ref()).await?))
}

pub fn configure_performance_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/performance/me", get(my_performance))
        .route("/api/performance/users/:user_id", get(user_performance))
        .route("/api/performance/teams", get(all_team_performance))
        .route("/api/performance/teams/:team_id", get(single_team_performance))
        .route(
            "/api/performance/lead-source-summary",
            get(lead_source_report),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::DealStage;
    use crate::core::shared::models::Contact;
    use crate::core::store::MemoryStore;

    fn deal(owner: Uuid, stage: DealStage, value: f64) -> Deal {
        let mut deal = Deal::new(owner, Uuid::new_v4(), "Unit".into());
        deal.stage = stage;
        deal.value = value;
        deal
    }

    #[test]
    fn test_stage_classification_is_exhaustive() {
        let owner = Uuid::new_v4();
        let deals: Vec<Deal> = DealStage::ALL
            .iter()
            .map(|stage| deal(owner, *stage, 100.0))
            .collect();

        let stats = calculate_deal_stats(&deals);
        assert_eq!(stats.total_deals, 6);
        assert_eq!(stats.won_deals, 1);
        assert_eq!(stats.lost_deals, 1);
        assert_eq!(stats.open_deals, 4);
        assert_eq!(
            stats.won_deals + stats.lost_deals + stats.open_deals,
            stats.total_deals
        );
        assert_eq!(stats.total_value, 600.0);
        assert_eq!(stats.won_value, 100.0);
        assert_eq!(stats.open_value, 400.0);
    }

    #[test]
    fn test_empty_and_non_finite() {
        assert_eq!(calculate_deal_stats(&[]), DealStats::default());

        let owner = Uuid::new_v4();
        let stats = calculate_deal_stats(&[
            deal(owner, DealStage::Won, f64::NAN),
            deal(owner, DealStage::Won, 250.0),
        ]);
        assert_eq!(stats.won_deals, 2);
        assert_eq!(stats.won_value, 250.0);
    }

    #[tokio::test]
    async fn test_team_stats_cover_members_only() {
        let store = MemoryStore::new();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for d in [
            deal(a, DealStage::Won, 1000.0),
            deal(b, DealStage::Proposal, 500.0),
            deal(outsider, DealStage::Won, 9999.0),
        ] {
            store.deals().insert(d).await.unwrap();
        }

        let mut team = Team::new("North".into());
        team.add_member(a);
        team.add_member(b);
        let perf = team_stats(&store, &team).await.unwrap();
        assert_eq!(perf.member_count, 2);
        assert_eq!(perf.stats.total_deals, 2);
        assert_eq!(perf.stats.won_value, 1000.0);
        assert_eq!(perf.stats.open_value, 500.0);

        let empty = team_stats(&store, &Team::new("Empty".into())).await.unwrap();
        assert_eq!(empty.stats, DealStats::default());
    }

    #[tokio::test]
    async fn test_lead_source_summary_ordering() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for source in [
            LeadSource::Website,
            LeadSource::Referral,
            LeadSource::Referral,
            LeadSource::Advertisement,
            LeadSource::Website,
            LeadSource::WalkIn,
            LeadSource::Referral,
        ] {
            let mut contact = Contact::new(owner, "Lead".into());
            contact.lead_source = source;
            store.contacts().insert(contact).await.unwrap();
        }

        let summary = lead_source_summary(&store).await.unwrap();
        let flat: Vec<(&str, i64)> = summary
            .iter()
            .map(|row| (row.source.as_str(), row.count))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Referral", 3),
                ("Website", 2),
                ("Advertisement", 1),
                ("Walk-in", 1),
            ]
        );
        assert_eq!(
            serde_json::to_value(&summary[0]).unwrap(),
            serde_json::json!({ "source": "Referral", "count": 3 })
        );
    }
}
