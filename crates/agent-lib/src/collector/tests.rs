//! Integration tests for the cgroup unit source
//!
//! These tests use a mock cgroup filesystem to exercise discovery and
//! snapshot reading without a container runtime.

#[cfg(test)]
mod mock_cgroup_tests {
    use crate::collector::{create_source, CgroupV2Source, UnitSource};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::fs;

    const WEB_ID: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const DB_ID: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    struct MockContainer<'a> {
        dir_name: String,
        procs: &'a str,
        memory_current: u64,
        memory_max: &'a str,
        pids: u64,
        oom_kill: u64,
        frozen: bool,
    }

    impl<'a> MockContainer<'a> {
        fn running(dir_name: String) -> Self {
            Self {
                dir_name,
                procs: "101\n102\n",
                memory_current: 268_435_456,
                memory_max: "536870912",
                pids: 2,
                oom_kill: 0,
                frozen: false,
            }
        }
    }

    /// Helper to create a mock cgroup v2 root with proc/meminfo next to it
    async fn create_mock_root(temp_dir: &TempDir) -> (PathBuf, PathBuf) {
        let cgroup_root = temp_dir.path().join("cgroup");
        let proc_root = temp_dir.path().join("proc");
        fs::create_dir_all(&cgroup_root).await.unwrap();
        fs::create_dir_all(&proc_root).await.unwrap();

        fs::write(cgroup_root.join("cgroup.controllers"), "cpu memory pids io\n")
            .await
            .unwrap();
        fs::write(proc_root.join("meminfo"), "MemTotal:        1048576 kB\n")
            .await
            .unwrap();

        (cgroup_root, proc_root)
    }

    async fn add_container(parent: &Path, container: &MockContainer<'_>) -> PathBuf {
        let path = parent.join(&container.dir_name);
        fs::create_dir_all(&path).await.unwrap();

        fs::write(path.join("cgroup.procs"), container.procs).await.unwrap();
        fs::write(path.join("cpu.stat"), "usage_usec 5000000\nuser_usec 3000000\n")
            .await
            .unwrap();
        fs::write(
            path.join("memory.current"),
            format!("{}\n", container.memory_current),
        )
        .await
        .unwrap();
        fs::write(path.join("memory.max"), format!("{}\n", container.memory_max))
            .await
            .unwrap();
        fs::write(path.join("pids.current"), format!("{}\n", container.pids))
            .await
            .unwrap();
        fs::write(
            path.join("memory.events"),
            format!("low 0\nhigh 0\nmax 0\noom 0\noom_kill {}\n", container.oom_kill),
        )
        .await
        .unwrap();
        fs::write(
            path.join("cgroup.freeze"),
            if container.frozen { "1\n" } else { "0\n" },
        )
        .await
        .unwrap();

        path
    }

    #[tokio::test]
    async fn test_discovers_nested_containers() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;

        let system = root.join("system.slice");
        add_container(&system, &MockContainer::running(format!("docker-{}.scope", WEB_ID))).await;
        let kubepods = root.join("kubepods.slice").join("kubepods-pod1.slice");
        add_container(&kubepods, &MockContainer::running(format!("crio-{}.scope", DB_ID))).await;
        // Non-container cgroup with cpu.stat is ignored
        fs::create_dir_all(root.join("user.slice")).await.unwrap();
        fs::write(root.join("user.slice").join("cpu.stat"), "usage_usec 1\n")
            .await
            .unwrap();

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name, "111111111111");
        assert_eq!(units[1].name, "222222222222");
        assert!(units[1].id.starts_with("kubepods.slice"));
    }

    #[tokio::test]
    async fn test_fetch_metrics() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        let mut container = MockContainer::running(WEB_ID.to_string());
        container.pids = 150;
        add_container(&root, &container).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();
        let metrics = source.fetch_metrics(&units[0]).await.unwrap();

        // First reading has no CPU baseline
        assert_eq!(metrics.cpu_percent, 0.0);
        assert_eq!(metrics.memory_percent, 50.0);
        assert_eq!(metrics.pids, 150);
    }

    #[tokio::test]
    async fn test_unlimited_memory_uses_host_total() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        let mut container = MockContainer::running(WEB_ID.to_string());
        container.memory_max = "max";
        // 1048576 kB host, 268435456 bytes used = 25%
        add_container(&root, &container).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();
        let metrics = source.fetch_metrics(&units[0]).await.unwrap();

        assert_eq!(metrics.memory_percent, 25.0);
    }

    #[tokio::test]
    async fn test_fetch_state() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;

        add_container(&root, &MockContainer::running(WEB_ID.to_string())).await;
        let mut dead = MockContainer::running(DB_ID.to_string());
        dead.procs = "";
        dead.oom_kill = 1;
        add_container(&root, &dead).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();

        let web = source.fetch_state(&units[0]).await.unwrap();
        assert_eq!(web.status, "running");
        assert!(!web.oom_killed);

        let db = source.fetch_state(&units[1]).await.unwrap();
        assert_eq!(db.status, "exited");
        assert!(db.oom_killed);
        assert_eq!(db.restart_count, 0);
    }

    #[tokio::test]
    async fn test_frozen_is_paused() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        let mut container = MockContainer::running(WEB_ID.to_string());
        container.frozen = true;
        add_container(&root, &container).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();
        let state = source.fetch_state(&units[0]).await.unwrap();

        assert_eq!(state.status, "paused");
    }

    #[tokio::test]
    async fn test_vanished_unit_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        let path = add_container(&root, &MockContainer::running(WEB_ID.to_string())).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let units = source.list_units().await.unwrap();
        fs::remove_dir_all(&path).await.unwrap();

        assert!(source.fetch_metrics(&units[0]).await.is_err());
        assert!(source.fetch_state(&units[0]).await.is_err());
    }

    #[tokio::test]
    async fn test_vanished_subtree_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        add_container(&root, &MockContainer::running(WEB_ID.to_string())).await;

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        let gone = root.join("user.slice").join("session-9.scope");
        let units = source.walk(vec![root.clone(), gone]).await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "111111111111");
    }

    #[tokio::test]
    async fn test_missing_root_fails_listing() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        fs::remove_dir_all(&root).await.unwrap();

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        assert!(source.list_units().await.is_err());
    }

    #[tokio::test]
    async fn test_listing_survives_session_churn() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        add_container(&root, &MockContainer::running(WEB_ID.to_string())).await;

        let done = Arc::new(AtomicBool::new(false));
        let churn = {
            let user = root.join("user.slice");
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut n = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let session = user.join(format!("session-{}.scope", n % 4));
                    let _ = std::fs::create_dir_all(session.join("a").join("b"));
                    let _ = std::fs::remove_dir_all(&session);
                    n += 1;
                }
            })
        };

        let source = CgroupV2Source::with_proc_path(&root, &proc_root);
        for _ in 0..300 {
            let units = source.list_units().await.unwrap();
            assert_eq!(units.len(), 1);
        }

        done.store(true, Ordering::Relaxed);
        churn.join().unwrap();
    }

    #[tokio::test]
    async fn test_create_source_requires_v2() {
        let temp_dir = TempDir::new().unwrap();
        let (root, proc_root) = create_mock_root(&temp_dir).await;
        assert!(create_source(&root, &proc_root).await.is_ok());

        let empty = temp_dir.path().join("legacy");
        fs::create_dir_all(&empty).await.unwrap();
        assert!(create_source(&empty, &proc_root).await.is_err());
    }
}
