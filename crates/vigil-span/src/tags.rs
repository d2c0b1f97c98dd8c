//! Span tag names and well-known values for the test-visibility protocol.

/// Test module name.
pub const TEST_MODULE: &str = "test.module";

/// Test suite name.
pub const TEST_SUITE: &str = "test.suite";

/// Test name.
pub const TEST_NAME: &str = "test.name";

/// Type of the unit (test, benchmark).
pub const TEST_TYPE: &str = "test.type";

/// Test framework name.
pub const TEST_FRAMEWORK: &str = "test.framework";

/// Test framework version.
pub const TEST_FRAMEWORK_VERSION: &str = "test.framework_version";

/// Test execution status.
pub const TEST_STATUS: &str = "test.status";

/// Skip reason of the test.
pub const TEST_SKIP_REASON: &str = "test.skip_reason";

/// Source file where the test is located, relative to the source root.
pub const TEST_SOURCE_FILE: &str = "test.source.file";

/// Line of the source file where the test starts.
pub const TEST_SOURCE_START_LINE: &str = "test.source.start";

/// Owners of the test, as resolved by an external code-owners source.
pub const TEST_CODEOWNERS: &str = "test.codeowners";

/// The test command.
pub const TEST_COMMAND: &str = "test.command";

/// Exit code of the test command.
pub const TEST_EXIT_CODE: &str = "test.exit_code";

/// Working directory of the test command, relative to the source root.
pub const TEST_WORKING_DIRECTORY: &str = "test.working_directory";

/// Valid `test.status` values.
pub const STATUS_PASS: &str = "pass";
/// See [`STATUS_PASS`].
pub const STATUS_FAIL: &str = "fail";
/// See [`STATUS_PASS`].
pub const STATUS_SKIP: &str = "skip";

/// Valid `test.type` values.
pub const TYPE_TEST: &str = "test";
/// See [`TYPE_TEST`].
pub const TYPE_BENCHMARK: &str = "benchmark";

/// Origin tag set on every span produced by the instrumentation.
pub const ORIGIN: &str = "_vigil.origin";
/// Origin value marking spans as coming from a CI test run.
pub const CI_TEST_ORIGIN: &str = "ci-test";

/// Error detail tags.
pub const ERROR_TYPE: &str = "error.type";
/// See [`ERROR_TYPE`].
pub const ERROR_MSG: &str = "error.msg";
/// See [`ERROR_TYPE`].
pub const ERROR_STACK: &str = "error.stack";

/// Git environment tags.
pub const GIT_REPOSITORY_URL: &str = "git.repository_url";
/// See [`GIT_REPOSITORY_URL`].
pub const GIT_BRANCH: &str = "git.branch";
/// See [`GIT_REPOSITORY_URL`].
pub const GIT_COMMIT_SHA: &str = "git.commit.sha";
