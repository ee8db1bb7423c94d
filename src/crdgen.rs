use kube::CustomResourceExt;
fn main() {
    let documents = vec![bucket_operator::resources::objectstorage::bucket::Bucket::crd()];

    for document in documents {
        print!("---\n");
        print!(
            "{}",
            serde_yaml::to_string(&document).expect("failed to serialize crd")
        );
    }
}
