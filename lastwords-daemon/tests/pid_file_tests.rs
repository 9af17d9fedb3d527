//! PID file creation, deletion, and duplicate detection tests.
//!
//! Tests the PID file lifecycle: create → exists → delete, and
//! duplicate daemon detection behavior at the filesystem level.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_pid_file_creation_basic() {
    // Given: A temp directory for PID file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("lastwords.pid");

    // When: Writing PID file
    let pid = std::process::id();
    fs::write(&pid_path, pid.to_string()).expect("should write PID file");

    // Then: File should exist with correct PID
    assert!(pid_path.exists(), "PID file should exist");
    let content = fs::read_to_string(&pid_path).expect("should read PID file");
    assert_eq!(content, pid.to_string(), "PID should match");
}

#[test]
fn test_pid_file_deletion() {
    // Given: An existing PID file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("lastwords.pid");
    fs::write(&pid_path, "12345").expect("should write PID file");
    assert!(pid_path.exists(), "PID file should exist before deletion");

    // When: Deleting PID file
    fs::remove_file(&pid_path).expect("should delete PID file");

    // Then: File should not exist
    assert!(!pid_path.exists(), "PID file should be deleted");
}

#[test]
fn test_pid_file_directory_does_not_exist() {
    // Given: A nonexistent directory path
    let pid_path = PathBuf::from("/nonexistent/directory/lastwords.pid");

    // When: Attempting to write PID file
    let result = fs::write(&pid_path, "12345");

    // Then: Should fail
    assert!(result.is_err(), "should fail when directory doesn't exist");
}

#[test]
fn test_pid_file_permission_denied_simulation() {
    // Given: A path that simulates permission issues (root-only path on Unix)
    // Note: When the test itself runs privileged the write is allowed,
    // so there is nothing to assert in that case.

    #[cfg(unix)]
    {
        let pid_path = PathBuf::from("/root/lastwords.pid");

        // When: Attempting to write PID file without permissions
        match fs::write(&pid_path, "12345") {
            Ok(()) => {
                let _ = fs::remove_file(&pid_path);
            }
            // Then: Should fail with permission denied (NotFound covers
            // systems without a /root home)
            Err(e) => assert!(
                matches!(
                    e.kind(),
                    std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound
                ),
                "unexpected error kind: {:?}",
                e.kind()
            ),
        }
    }
}

#[test]
fn test_pid_file_read_invalid_content() {
    // Given: A PID file with non-numeric content
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("lastwords.pid");
    fs::write(&pid_path, "not_a_number").expect("should write invalid PID");

    // When: Reading PID file
    let content = fs::read_to_string(&pid_path).expect("should read file");

    // Then: Content should be invalid PID format
    assert_eq!(content, "not_a_number");
    assert!(content.parse::<u32>().is_err(), "should not parse as number");
}

#[test]
fn test_pid_file_special_characters_in_path() {
    // Given: A path with special characters
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("lastwords-daemon@1.0.pid");

    // When: Writing PID file
    fs::write(&pid_path, "12345").expect("should write PID with special chars");

    // Then: File should exist
    assert!(pid_path.exists(), "PID file with special chars should exist");
}

#[test]
fn test_pid_file_concurrent_creation() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    // Given: Multiple threads trying to create distinct PID files
    let temp_dir = Arc::new(TempDir::new().expect("should create temp dir"));
    let success_count = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let temp_dir = Arc::clone(&temp_dir);
            let success_count = Arc::clone(&success_count);
            thread::spawn(move || {
                let pid_path = temp_dir.path().join(format!("lastwords-{}.pid", i));
                if fs::write(&pid_path, "12345").is_ok() {
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    // When: All threads complete
    for handle in handles {
        handle.join().expect("thread should complete");
    }

    // Then: All writes should succeed
    assert_eq!(
        success_count.load(Ordering::SeqCst),
        10,
        "all concurrent writes should succeed"
    );
}

#[test]
fn test_pid_file_symlink_handling() {
    // Given: A PID file and a symlink to it
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pid_path = temp_dir.path().join("lastwords.pid");
    let symlink_path = temp_dir.path().join("lastwords-link.pid");

    fs::write(&pid_path, "12345").expect("should write PID file");

    #[cfg(unix)]
    {
        use std::os::unix::fs as unix_fs;
        unix_fs::symlink(&pid_path, &symlink_path).expect("should create symlink");

        // When: Reading via symlink
        let content = fs::read_to_string(&symlink_path).expect("should read via symlink");

        // Then: Should read original content
        assert_eq!(content, "12345", "should read PID via symlink");
    }
}
