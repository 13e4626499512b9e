//! Vagrantfile rendering for the build VM.

use crate::runtime::options::VmSettings;

pub const FILE_NAME: &str = "Vagrantfile";

/// Render a Vagrantfile that syncs `shared_dir` (relative to the working
/// directory) to the configured guest mount.
pub fn render(vm: &VmSettings, shared_dir: &str) -> String {
    format!(
        r#"# -*- mode: ruby -*-
# vi: set ft=ruby :
Vagrant.configure("2") do |config|
  config.vm.box = "{box_image}"
  config.vm.synced_folder "{shared_dir}", "{guest_mount}"
  config.vm.provider "{provider}" do |vb|
    vb.memory = "{memory}"
  end
end
"#,
        box_image = vm.box_image,
        shared_dir = shared_dir,
        guest_mount = vm.guest_mount,
        provider = vm.provider,
        memory = vm.memory_mib,
    )
}
