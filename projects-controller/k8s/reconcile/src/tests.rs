use super::*;
use maplit::btreemap;
use projects_controller_core::resources::cluster_role_ref;
use projects_controller_k8s_api::{ProjectSpec, SubjectRef};
use projects_controller_k8s_store::MemoryStore;

const POLL: Duration = Duration::from_secs(2);

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "projects=trace,debug".parse().unwrap()),
            )
            .finish(),
    )
}

fn mk_reconciler(store: &MemoryStore) -> Reconciler<MemoryStore> {
    Reconciler::new(store.clone(), cluster_role_ref("edit"), POLL)
}

fn mk_project(name: &str, access: Vec<SubjectRef>) -> Project {
    Project::new(name, ProjectSpec { access })
}

fn all_subjects() -> Vec<SubjectRef> {
    vec![
        SubjectRef::user("a"),
        SubjectRef::group("g"),
        SubjectRef::service_account("ns", "sa"),
    ]
}

async fn get<K: projects_controller_k8s_store::Object>(
    store: &MemoryStore,
    key: ObjectRef<K>,
) -> Option<K> {
    store.get(&key).await.expect("store must be available")
}

fn applied(reconciled: Reconciled) -> Applied {
    match reconciled {
        Reconciled::Applied(applied) => applied,
        reconciled => panic!("unexpected result: {reconciled:?}"),
    }
}

#[tokio::test]
async fn creates_project_resources() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    let mut project = mk_project("team-a", all_subjects());
    project.metadata.labels = Some(btreemap! {
        "team".to_string() => "a".to_string(),
    });
    store.create(&project).await.unwrap();

    let applied = applied(mk_reconciler(&store).reconcile("team-a").await.unwrap());
    assert_eq!(
        applied,
        Applied {
            namespace: Outcome::Created,
            cluster_role: Outcome::Created,
            cluster_role_binding: Outcome::Created,
            role_binding: Outcome::Created,
            finalizer: Outcome::Updated,
        }
    );

    assert_eq!(store.names::<Namespace>(), vec!["team-a"]);
    let ns = get(&store, ObjectRef::<Namespace>::new("team-a")).await.unwrap();
    assert_eq!(ns.metadata.labels, project.metadata.labels);

    let role = get(&store, ObjectRef::<ClusterRole>::new("team-a-clusterrole"))
        .await
        .unwrap();
    let rules = role.rules.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].resource_names, Some(vec!["team-a".to_string()]));
    assert_eq!(
        rules[0].verbs,
        vec!["get", "update", "delete", "patch", "watch"]
    );

    let crb = get(
        &store,
        ObjectRef::<ClusterRoleBinding>::new("team-a-clusterrolebinding"),
    )
    .await
    .unwrap();
    assert_eq!(crb.role_ref, cluster_role_ref("team-a-clusterrole"));
    let subjects = crb.subjects.unwrap();
    assert_eq!(
        subjects,
        vec![
            k8s::Subject {
                kind: "User".to_string(),
                name: "a".to_string(),
                api_group: Some("rbac.authorization.k8s.io".to_string()),
                namespace: None,
            },
            k8s::Subject {
                kind: "Group".to_string(),
                name: "g".to_string(),
                api_group: Some("rbac.authorization.k8s.io".to_string()),
                namespace: None,
            },
            k8s::Subject {
                kind: "ServiceAccount".to_string(),
                name: "sa".to_string(),
                api_group: None,
                namespace: Some("ns".to_string()),
            },
        ]
    );

    let rb = get(
        &store,
        ObjectRef::<RoleBinding>::new("team-a-rolebinding").within("team-a"),
    )
    .await
    .unwrap();
    assert_eq!(rb.role_ref, cluster_role_ref("edit"));
    assert_eq!(rb.subjects, Some(subjects));

    let project = get(&store, ObjectRef::<Project>::new("team-a")).await.unwrap();
    assert!(finalizer::contains(&project, WAIT_FOR_NAMESPACE));
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    store
        .create(&mk_project("team-a", all_subjects()))
        .await
        .unwrap();
    let reconciler = mk_reconciler(&store);

    reconciler.reconcile("team-a").await.unwrap();
    let applied = applied(reconciler.reconcile("team-a").await.unwrap());
    assert_eq!(
        applied,
        Applied {
            namespace: Outcome::Unchanged,
            cluster_role: Outcome::Unchanged,
            cluster_role_binding: Outcome::Unchanged,
            role_binding: Outcome::Unchanged,
            finalizer: Outcome::Unchanged,
        }
    );
    assert_eq!(store.names::<ClusterRoleBinding>().len(), 1);
    assert_eq!(store.names::<RoleBinding>().len(), 1);
}

#[tokio::test]
async fn updates_bindings_when_access_changes() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    store
        .create(&mk_project("team-a", vec![SubjectRef::user("a")]))
        .await
        .unwrap();
    let reconciler = mk_reconciler(&store);
    reconciler.reconcile("team-a").await.unwrap();

    let mut project = get(&store, ObjectRef::<Project>::new("team-a")).await.unwrap();
    project.spec.access.push(SubjectRef::group("g"));
    store.replace(&project).await.unwrap();

    let applied = applied(reconciler.reconcile("team-a").await.unwrap());
    assert_eq!(applied.namespace, Outcome::Unchanged);
    assert_eq!(applied.cluster_role, Outcome::Unchanged);
    assert_eq!(applied.cluster_role_binding, Outcome::Updated);
    assert_eq!(applied.role_binding, Outcome::Updated);
    assert_eq!(applied.finalizer, Outcome::Unchanged);

    let rb = get(
        &store,
        ObjectRef::<RoleBinding>::new("team-a-rolebinding").within("team-a"),
    )
    .await
    .unwrap();
    assert_eq!(rb.subjects.map(|s| s.len()), Some(2));
}

#[tokio::test]
async fn leaves_existing_namespace() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    let mut ns = Namespace::default();
    ns.metadata.name = Some("team-a".to_string());
    store.create(&ns).await.unwrap();
    let mut project = mk_project("team-a", vec![]);
    project.metadata.labels = Some(btreemap! {
        "team".to_string() => "a".to_string(),
    });
    store.create(&project).await.unwrap();

    let applied = applied(mk_reconciler(&store).reconcile("team-a").await.unwrap());
    assert_eq!(applied.namespace, Outcome::Unchanged);

    let ns = get(&store, ObjectRef::<Namespace>::new("team-a")).await.unwrap();
    assert_eq!(ns.metadata.labels, None);
    assert_eq!(ns.metadata.owner_references, None);
}

#[tokio::test]
async fn missing_project_is_a_noop() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    let reconciled = mk_reconciler(&store).reconcile("team-a").await.unwrap();
    assert_eq!(reconciled, Reconciled::Missing);
    assert!(store.names::<Namespace>().is_empty());
}

#[tokio::test]
async fn removes_finalizer_only_after_namespace_is_gone() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    store
        .create(&mk_project("team-a", all_subjects()))
        .await
        .unwrap();
    let reconciler = mk_reconciler(&store);
    reconciler.reconcile("team-a").await.unwrap();

    // Keep the namespace around after it is deleted, as the API server does
    // while it removes the namespace's contents.
    let ns_key = ObjectRef::<Namespace>::new("team-a");
    let mut ns = get(&store, ns_key.clone()).await.unwrap();
    ns.metadata.finalizers = Some(vec!["test/hold".to_string()]);
    store.replace(&ns).await.unwrap();

    let project_key = ObjectRef::<Project>::new("team-a");
    store.delete(&project_key).await.unwrap();

    for _ in 0..3 {
        let reconciled = reconciler.reconcile("team-a").await.unwrap();
        assert_eq!(reconciled, Reconciled::Terminating);
        assert_eq!(reconciled.action(POLL), Action::requeue(POLL));

        let ns = get(&store, ns_key.clone()).await.unwrap();
        assert!(ns.metadata.deletion_timestamp.is_some());
        let project = get(&store, project_key.clone()).await.unwrap();
        assert!(finalizer::contains(&project, WAIT_FOR_NAMESPACE));

        // A terminating project's bindings are never recreated.
        assert!(store.names::<RoleBinding>().is_empty());
        assert_eq!(
            store.names::<ClusterRoleBinding>(),
            vec!["team-a-clusterrolebinding"]
        );
    }

    let mut ns = get(&store, ns_key.clone()).await.unwrap();
    ns.metadata.finalizers = None;
    store.replace(&ns).await.unwrap();
    assert_eq!(get(&store, ns_key).await, None);
    assert!(store.names::<RoleBinding>().is_empty());

    let reconciled = reconciler.reconcile("team-a").await.unwrap();
    assert_eq!(reconciled, Reconciled::Finalized(Outcome::Updated));

    // With its last finalizer cleared the project is removed, along with the
    // objects it owns.
    assert_eq!(get(&store, project_key).await, None);
    assert!(store.names::<ClusterRole>().is_empty());
    assert!(store.names::<ClusterRoleBinding>().is_empty());

    let reconciled = reconciler.reconcile("team-a").await.unwrap();
    assert_eq!(reconciled, Reconciled::Missing);
}

#[tokio::test]
async fn finalizes_project_deleted_before_first_reconcile() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    let mut project = mk_project("team-z", all_subjects());
    project.metadata.finalizers = Some(vec!["other/hold".to_string()]);
    store.create(&project).await.unwrap();

    let project_key = ObjectRef::<Project>::new("team-z");
    store.delete(&project_key).await.unwrap();

    let reconciler = mk_reconciler(&store);
    let reconciled = reconciler.reconcile("team-z").await.unwrap();
    assert_eq!(reconciled, Reconciled::Finalized(Outcome::Unchanged));
    assert_eq!(reconciled.action(POLL), Action::await_change());

    assert!(store.names::<Namespace>().is_empty());
    assert!(store.names::<ClusterRole>().is_empty());
    assert!(store.names::<ClusterRoleBinding>().is_empty());
    assert!(store.names::<RoleBinding>().is_empty());

    let project = get(&store, project_key).await.unwrap();
    assert!(project.metadata.deletion_timestamp.is_some());
    assert_eq!(
        project.metadata.finalizers,
        Some(vec!["other/hold".to_string()])
    );
}

#[tokio::test]
async fn failed_step_is_retried() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    store
        .create(&mk_project("team-a", all_subjects()))
        .await
        .unwrap();
    let reconciler = mk_reconciler(&store);

    store.fail::<RoleBinding>();
    let err = reconciler.reconcile("team-a").await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "{err}");
    assert_eq!(store.names::<Namespace>(), vec!["team-a"]);
    assert_eq!(
        store.names::<ClusterRoleBinding>(),
        vec!["team-a-clusterrolebinding"]
    );
    let project = get(&store, ObjectRef::<Project>::new("team-a")).await.unwrap();
    assert!(!finalizer::contains(&project, WAIT_FOR_NAMESPACE));

    store.heal::<RoleBinding>();
    let applied = applied(reconciler.reconcile("team-a").await.unwrap());
    assert_eq!(applied.namespace, Outcome::Unchanged);
    assert_eq!(applied.role_binding, Outcome::Created);
    assert_eq!(applied.finalizer, Outcome::Updated);
}

#[tokio::test]
async fn controller_actions() {
    let _tracing = init_tracing();
    let store = MemoryStore::default();
    let project = store
        .create(&mk_project("team-a", vec![SubjectRef::user("a")]))
        .await
        .unwrap();
    let ctx = Arc::new(mk_reconciler(&store));

    let action = reconcile(Arc::new(project.clone()), ctx.clone())
        .await
        .unwrap();
    assert_eq!(action, Action::await_change());

    store.fail::<Project>();
    let err = reconcile(Arc::new(project.clone()), ctx.clone())
        .await
        .unwrap_err();
    assert_eq!(
        error_policy(Arc::new(project), &err, ctx),
        Action::requeue(ERROR_BACKOFF)
    );
}
