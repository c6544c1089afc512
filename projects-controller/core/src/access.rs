use crate::{identity::service_account_username, subject::service_account_namespace};
use ahash::AHashMap as HashMap;
use projects_controller_k8s_api::{Project, ResourceExt, SubjectKind, UserInfo};
use std::collections::BTreeSet;

/// Maps identities to the names of the projects that grant them access.
#[derive(Debug, Default)]
pub struct AccessIndex {
    groups: HashMap<String, Vec<String>>,
    users: HashMap<String, Vec<String>>,
    service_accounts: HashMap<String, Vec<String>>,
}

// === impl AccessIndex ===

impl AccessIndex {
    pub fn new<'p>(projects: impl IntoIterator<Item = &'p Project>) -> Self {
        let mut index = Self::default();
        for project in projects {
            let name = project.name_any();
            for subject in &project.spec.access {
                let (table, key) = match subject.kind {
                    SubjectKind::Group => (&mut index.groups, subject.name.clone()),
                    SubjectKind::User => (&mut index.users, subject.name.clone()),
                    SubjectKind::ServiceAccount => (
                        &mut index.service_accounts,
                        service_account_username(
                            service_account_namespace(subject),
                            &subject.name,
                        ),
                    ),
                };
                table.entry(key).or_default().push(name.clone());
            }
        }
        index
    }

    /// Returns the sorted, deduplicated names of every project visible to `user`.
    pub fn visible_projects(&self, user: &UserInfo) -> Vec<String> {
        let mut projects = BTreeSet::new();
        let mut extend = |table: &HashMap<String, Vec<String>>, key: &str| {
            if let Some(names) = table.get(key) {
                projects.extend(names.iter().cloned());
            }
        };

        for group in user.groups.iter().flatten() {
            extend(&self.groups, group);
        }
        if let Some(username) = user.username.as_deref() {
            extend(&self.users, username);
            extend(&self.service_accounts, username);
        }

        projects.into_iter().collect()
    }
}
