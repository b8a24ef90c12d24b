// ABOUTME: Groups one container listing into pods, compose service slots and standalone containers.
// ABOUTME: Rebuilt on every refresh; infra containers never appear.

use crate::config::LabelConfig;
use crate::model::{ContainerState, ContainerSummary, PodSummary};
use crate::types::{ContainerId, PodId};
use std::collections::{HashMap, HashSet};

/// A pod and the visible containers inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct PodGroup {
    pub pod: PodSummary,
    pub members: Vec<ContainerId>,
}

/// A declared compose service and the container filling it, if one runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSlot {
    pub name: String,
    pub container: Option<ContainerId>,
}

/// Display grouping for one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub pods: Vec<PodGroup>,
    pub services: Vec<ServiceSlot>,
    pub standalone: Vec<ContainerId>,
}

/// Inputs to [`Hierarchy::build`].
#[derive(Debug, Clone, Copy)]
pub struct GroupingRules<'a> {
    pub labels: &'a LabelConfig,
    pub show_exited: bool,
    /// Containers the compose tool reports for its project. When non-empty,
    /// only these may fill a service slot. IDs may be abbreviated.
    pub project: &'a [ContainerId],
}

impl GroupingRules<'_> {
    fn in_project(&self, id: &ContainerId) -> bool {
        self.project.is_empty()
            || self
                .project
                .iter()
                .any(|p| id.as_str().starts_with(p.as_str()) || p.as_str().starts_with(id.as_str()))
    }
}

impl Hierarchy {
    /// Partition `containers`: pod members first, then service slots, then
    /// whatever is left. Each container lands in exactly one place.
    pub fn build(
        containers: &[ContainerSummary],
        pods: &[PodSummary],
        services: &[String],
        rules: GroupingRules<'_>,
    ) -> Self {
        let infra: HashSet<&ContainerId> = pods.iter().filter_map(|p| p.infra_id.as_ref()).collect();
        let listed_in_pod: HashMap<&ContainerId, &PodId> = pods
            .iter()
            .flat_map(|p| p.containers.iter().map(move |c| (c, &p.id)))
            .collect();

        let visible: Vec<&ContainerSummary> = containers
            .iter()
            .filter(|c| !c.is_infra && !infra.contains(&c.id))
            .filter(|c| rules.show_exited || c.state != ContainerState::Exited)
            .collect();

        let mut groups: Vec<PodGroup> = pods
            .iter()
            .map(|pod| PodGroup {
                pod: pod.clone(),
                members: Vec::new(),
            })
            .collect();

        let mut slots: Vec<ServiceSlot> = Vec::new();
        for name in services {
            if !slots.iter().any(|s| &s.name == name) {
                slots.push(ServiceSlot {
                    name: name.clone(),
                    container: None,
                });
            }
        }

        let mut standalone = Vec::new();
        for container in visible {
            let pod_id = container
                .pod_id
                .as_ref()
                .or_else(|| listed_in_pod.get(&container.id).copied());
            if let Some(pod_id) = pod_id {
                let index = match groups.iter().position(|g| &g.pod.id == pod_id) {
                    Some(index) => index,
                    None => {
                        let name = container.pod_name.clone().unwrap_or_else(|| pod_id.to_string());
                        groups.push(PodGroup {
                            pod: PodSummary::new(pod_id.clone(), name),
                            members: Vec::new(),
                        });
                        groups.len() - 1
                    }
                };
                groups[index].members.push(container.id.clone());
                continue;
            }

            if let Some(slot) = open_slot(&mut slots, container, &rules) {
                slot.container = Some(container.id.clone());
                continue;
            }

            standalone.push(container);
        }

        let names: HashMap<&ContainerId, String> = containers
            .iter()
            .map(|c| (&c.id, c.display_name(&rules.labels.name)))
            .collect();
        let by_name = |a: &ContainerId, b: &ContainerId| {
            names
                .get(a)
                .cmp(&names.get(b))
                .then_with(|| a.cmp(b))
        };

        for group in &mut groups {
            group.members.sort_by(|a, b| by_name(a, b));
        }
        groups.sort_by(|a, b| {
            a.members
                .is_empty()
                .cmp(&b.members.is_empty())
                .then_with(|| a.pod.name.cmp(&b.pod.name))
        });
        slots.sort_by(|a, b| {
            a.container
                .is_none()
                .cmp(&b.container.is_none())
                .then_with(|| a.name.cmp(&b.name))
        });
        let mut standalone: Vec<ContainerId> = standalone.into_iter().map(|c| c.id.clone()).collect();
        standalone.sort_by(|a, b| by_name(a, b));

        Self {
            pods: groups,
            services: slots,
            standalone,
        }
    }

    /// Every container placed anywhere in the hierarchy.
    pub fn container_ids(&self) -> impl Iterator<Item = &ContainerId> {
        self.pods
            .iter()
            .flat_map(|g| g.members.iter())
            .chain(self.services.iter().filter_map(|s| s.container.as_ref()))
            .chain(self.standalone.iter())
    }
}

/// The still-empty slot named by the container's service label. One-off
/// containers (`compose run`) and containers of other projects never fill a slot.
fn open_slot<'a>(
    slots: &'a mut [ServiceSlot],
    container: &ContainerSummary,
    rules: &GroupingRules<'_>,
) -> Option<&'a mut ServiceSlot> {
    let service = container.label(&rules.labels.service)?;
    if container
        .label(&rules.labels.one_off)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return None;
    }
    if !rules.in_project(&container.id) {
        return None;
    }
    slots
        .iter_mut()
        .find(|slot| slot.name == service && slot.container.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, name: &str) -> ContainerSummary {
        let mut c = ContainerSummary::new(ContainerId::new(id));
        c.names = vec![format!("/{name}")];
        c.state = ContainerState::Running;
        c
    }

    fn with_service(mut c: ContainerSummary, service: &str) -> ContainerSummary {
        c.labels
            .insert("com.docker.compose.service".to_string(), service.to_string());
        c
    }

    fn build(containers: &[ContainerSummary], pods: &[PodSummary], services: &[&str]) -> Hierarchy {
        build_in_project(containers, pods, services, &[])
    }

    fn build_in_project(
        containers: &[ContainerSummary],
        pods: &[PodSummary],
        services: &[&str],
        project: &[&str],
    ) -> Hierarchy {
        let labels = LabelConfig::default();
        let services: Vec<String> = services.iter().map(|s| s.to_string()).collect();
        let project: Vec<ContainerId> = project.iter().map(|id| ContainerId::new(*id)).collect();
        Hierarchy::build(
            containers,
            pods,
            &services,
            GroupingRules {
                labels: &labels,
                show_exited: true,
                project: &project,
            },
        )
    }

    fn ids(list: &[ContainerId]) -> Vec<&str> {
        list.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn service_label_fills_matching_slot() {
        let containers = vec![with_service(container("c1", "app-web-1"), "web"), container("c2", "tool")];
        let h = build(&containers, &[], &["web", "db"]);

        assert_eq!(h.services[0].name, "web");
        assert_eq!(h.services[0].container, Some(ContainerId::new("c1")));
        assert_eq!(h.services[1].name, "db");
        assert_eq!(h.services[1].container, None);
        assert_eq!(ids(&h.standalone), vec!["c2"]);
    }

    #[test]
    fn one_container_per_service_slot() {
        let containers = vec![
            with_service(container("c1", "web-1"), "web"),
            with_service(container("c2", "web-2"), "web"),
        ];
        let h = build(&containers, &[], &["web"]);
        assert_eq!(h.services[0].container, Some(ContainerId::new("c1")));
        assert_eq!(ids(&h.standalone), vec!["c2"]);
    }

    #[test]
    fn one_off_containers_stay_standalone() {
        let mut run = with_service(container("c1", "web-run"), "web");
        run.labels
            .insert("com.docker.compose.oneoff".to_string(), "True".to_string());
        let h = build(&[run], &[], &["web"]);
        assert_eq!(h.services[0].container, None);
        assert_eq!(ids(&h.standalone), vec!["c1"]);
    }

    #[test]
    fn pod_members_nest_under_their_pod() {
        let mut member = container("c1", "api");
        member.pod_id = Some(PodId::new("p1"));
        let mut pod = PodSummary::new(PodId::new("p1"), "backend");
        pod.infra_id = Some(ContainerId::new("infra"));
        let mut infra = container("infra", "p1-infra");
        infra.is_infra = true;

        let h = build(&[member, infra, container("c2", "other")], &[pod], &[]);
        assert_eq!(h.pods.len(), 1);
        assert_eq!(ids(&h.pods[0].members), vec!["c1"]);
        assert_eq!(ids(&h.standalone), vec!["c2"]);
        assert_eq!(h.container_ids().count(), 2);
    }

    #[test]
    fn unknown_pod_gets_a_group_of_its_own() {
        let mut member = container("c1", "api");
        member.pod_id = Some(PodId::new("p9"));
        member.pod_name = Some("orphan".to_string());
        let h = build(&[member], &[], &[]);
        assert_eq!(h.pods[0].pod.name, "orphan");
        assert!(h.standalone.is_empty());
    }

    #[test]
    fn attached_groups_sort_first_then_alphabetically() {
        let mut member = container("c1", "api");
        member.pod_id = Some(PodId::new("pz"));
        let pods = vec![
            PodSummary::new(PodId::new("pa"), "alpha"),
            PodSummary::new(PodId::new("pz"), "zulu"),
            PodSummary::new(PodId::new("pm"), "mike"),
        ];
        let h = build(&[member, with_service(container("c2", "db-1"), "db")], &pods, &["cache", "db", "api"]);

        let pod_names: Vec<&str> = h.pods.iter().map(|g| g.pod.name.as_str()).collect();
        assert_eq!(pod_names, vec!["zulu", "alpha", "mike"]);
        let service_names: Vec<&str> = h.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(service_names, vec!["db", "api", "cache"]);
    }

    #[test]
    fn exited_containers_hidden_on_request() {
        let mut stopped = container("c1", "old");
        stopped.state = ContainerState::Exited;
        let containers = vec![stopped, container("c2", "new")];
        let labels = LabelConfig::default();
        let h = Hierarchy::build(
            &containers,
            &[],
            &[],
            GroupingRules {
                labels: &labels,
                show_exited: false,
                project: &[],
            },
        );
        assert_eq!(ids(&h.standalone), vec!["c2"]);
    }

    #[test]
    fn standalone_sorted_by_display_name() {
        let h = build(&[container("c1", "zeta"), container("c2", "alpha")], &[], &[]);
        assert_eq!(ids(&h.standalone), vec!["c2", "c1"]);
    }

    #[test]
    fn other_projects_do_not_fill_slots() {
        let ours = with_service(container("aaaa1111bbbb2222", "shop-web-1"), "web");
        let theirs = with_service(container("cccc3333dddd4444", "blog-web-1"), "web");
        // Listed in reverse so the foreign container is seen first.
        let h = build_in_project(&[theirs, ours], &[], &["web"], &["aaaa1111bbbb"]);
        assert_eq!(h.services[0].container, Some(ContainerId::new("aaaa1111bbbb2222")));
        assert_eq!(ids(&h.standalone), vec!["cccc3333dddd4444"]);
    }

    #[test]
    fn unknown_membership_allows_any_labelled_container() {
        let theirs = with_service(container("cccc3333dddd4444", "blog-web-1"), "web");
        let h = build_in_project(&[theirs], &[], &["web"], &[]);
        assert_eq!(h.services[0].container, Some(ContainerId::new("cccc3333dddd4444")));
    }
}
