// External collaborators behind narrow interfaces. The reconciliation logic
// never shells out directly; it goes through these traits so tests can
// inject fakes.

pub mod docker;
pub mod dokku;
pub mod traits;

pub use docker::DockerRuntime;
pub use dokku::DokkuHost;
pub use traits::{
    AuthRule, ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, HostRegistry, Mount,
};
