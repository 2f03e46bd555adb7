fn main() {
    prost_build::compile_protos(&["proto/comfoconnect.proto"], &["proto/"])
        .expect("compile comfoconnect.proto");
}
