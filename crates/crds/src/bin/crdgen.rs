//! Prints the ClusterRegistration CRD as YAML.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crd/clusterregistrations.yaml
//! ```

use crds::ClusterRegistration;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crd = ClusterRegistration::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
