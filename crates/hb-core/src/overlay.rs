//! Alias and label overlay on top of summary retrieval.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::filters::Filters;
use crate::reconcile::SummaryService;
use crate::store::{AliasStore, LabelStore};
use crate::summary::Summary;
use crate::summary_kind::SummaryKind;
use crate::types::UserId;
use crate::user::User;

/// How the raw summary beneath the overlay is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryRetriever {
    /// Persisted summaries plus recomputed gaps.
    #[default]
    Retrieve,
    /// Recompute everything from heartbeats.
    Summarize,
}

/// Applies user aliases and labels to summaries.
pub struct Overlay<'a> {
    service: SummaryService<'a>,
    aliases: &'a dyn AliasStore,
    labels: &'a dyn LabelStore,
}

impl<'a> Overlay<'a> {
    pub fn new(
        service: SummaryService<'a>,
        aliases: &'a dyn AliasStore,
        labels: &'a dyn LabelStore,
    ) -> Self {
        Self {
            service,
            aliases,
            labels,
        }
    }

    /// Retrieves a summary with aliases resolved and labels attached.
    ///
    /// Branch and entity breakdowns are kept only when `filters` name a
    /// project or label.
    pub fn aliased(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &User,
        retriever: SummaryRetriever,
        filters: &Filters,
    ) -> Result<Summary> {
        self.aliases.initialize_user(&user.id)?;
        let expanded = self.expand_filters(&user.id, filters)?;

        let summary = match retriever {
            SummaryRetriever::Retrieve => self.service.retrieve(from, to, user, &expanded)?,
            SummaryRetriever::Summarize => self.service.summarize(from, to, user, &expanded)?,
        };

        let mut summary = self.resolve_aliases(&user.id, summary)?;
        self.apply_labels(&user.id, &mut summary)?;
        summary.fill_missing();

        if !filters.is_project_details() {
            summary.branches.clear();
            summary.entities.clear();
        }
        Ok(summary.sorted())
    }

    /// Widens `filters` so they also match the raw keys behind them.
    ///
    /// Labels add their member projects; every value then adds the raw
    /// keys aliased to it. Labels without members, and no project filter
    /// alongside them, leave filters that match nothing.
    pub fn expand_filters(&self, user: &UserId, filters: &Filters) -> Result<Filters> {
        let mut expanded = filters.clone();

        if let Some(labels) = filters.values(SummaryKind::Label) {
            let grouped = self.labels.get_by_user_grouped_inverted(user)?;
            for label in labels {
                if let Some(members) = grouped.get(label) {
                    expanded.extend(
                        SummaryKind::Project,
                        members.iter().map(|m| m.project_key.clone()),
                    );
                }
            }
            if !expanded.has(SummaryKind::Project) {
                tracing::debug!(user = %user, ?labels, "label filter matches no project");
                expanded.reject_all();
            }
        }

        let requested: Vec<(SummaryKind, Vec<String>)> = expanded
            .iter()
            .filter(|(kind, _)| *kind != SummaryKind::Label)
            .map(|(kind, values)| (kind, values.iter().cloned().collect()))
            .collect();
        for (kind, values) in requested {
            for value in values {
                let aliases = self.aliases.get_by_key(user, kind, &value)?;
                expanded.extend(kind, aliases.into_iter().map(|a| a.value));
            }
        }

        Ok(expanded)
    }

    /// Rewrites every key to its canonical alias, merging collisions.
    fn resolve_aliases(&self, user: &UserId, mut summary: Summary) -> Result<Summary> {
        for kind in SummaryKind::COMPOSED {
            let items = std::mem::take(summary.items_mut(kind));
            for item in items {
                let key = self.aliases.get_alias_or_default(user, kind, &item.key)?;
                summary.add(kind, &key, item.total);
            }
        }
        Ok(summary)
    }

    /// Rebuilds the label dimension from project totals.
    fn apply_labels(&self, user: &UserId, summary: &mut Summary) -> Result<()> {
        let mut by_project: HashMap<String, Vec<String>> = HashMap::new();
        for label in self.labels.get_by_user(user)? {
            by_project
                .entry(label.project_key)
                .or_default()
                .push(label.label);
        }

        let totals: Vec<(String, chrono::TimeDelta)> = summary
            .projects
            .iter()
            .filter_map(|p| by_project.get(&p.key).map(|labels| (labels, p.total)))
            .flat_map(|(labels, total)| labels.iter().map(move |l| (l.clone(), total)))
            .collect();

        summary.labels.clear();
        for (label, total) in totals {
            summary.add(SummaryKind::Label, &label, total);
        }
        Ok(())
    }
}
