//! 示例服务
//!
//! 覆盖四种调用形态的用户服务，用于演示并驱动拦截器的端到端测试。

pub mod proto;
pub mod user;

pub use user::{UserClient, UserService};
